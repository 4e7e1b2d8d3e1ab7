use crate::{ExecutorError, Value};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Runtime type tag of a message; handlers are selected by it
pub type MessageKind = String;

/// A payload travelling between executors
///
/// The `kind` tag decides which executors accept the message and which
/// response handler receives it; the body is opaque to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub body: Value,
}

impl Message {
    pub fn new(kind: impl Into<MessageKind>, body: impl Into<Value>) -> Self {
        Self {
            kind: kind.into(),
            body: body.into(),
        }
    }

    /// Encode a typed payload under its declared kind
    pub fn from_payload<P: Payload>(payload: &P) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: P::KIND.to_string(),
            body: Value::Json(serde_json::to_value(payload)?),
        })
    }

    /// Decode the body as `P`, checking the kind tag first
    pub fn to_payload<P: Payload>(&self) -> Result<P, ExecutorError> {
        if self.kind != P::KIND {
            return Err(ExecutorError::InvalidPayload {
                kind: self.kind.clone(),
                reason: format!("expected kind '{}'", P::KIND),
            });
        }
        serde_json::from_value(self.body.to_json()).map_err(|e| ExecutorError::InvalidPayload {
            kind: self.kind.clone(),
            reason: e.to_string(),
        })
    }
}

/// A typed message body with a stable kind tag
pub trait Payload: Serialize + DeserializeOwned {
    const KIND: &'static str;
}
