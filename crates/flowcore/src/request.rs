use crate::{ExecutorId, Message, MessageKind};
use serde::{Deserialize, Serialize};

pub type RequestId = String;

/// An outstanding need for external input, raised by an executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub source_executor_id: ExecutorId,
    /// The payload handed to the caller
    pub request: Message,
    /// Kind the eventual response must carry
    pub response_kind: MessageKind,
}

impl PendingRequest {
    pub fn new(
        source_executor_id: impl Into<ExecutorId>,
        request: Message,
        response_kind: impl Into<MessageKind>,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            source_executor_id: source_executor_id.into(),
            request,
            response_kind: response_kind.into(),
        }
    }
}
