use crate::accepted_kinds;
use async_trait::async_trait;
use flowcore::{
    Capabilities, Executor, ExecutorError, ExecutorRef, Message, MessageKind, Payload, Value,
    WorkflowContext,
};
use flowruntime::{config_str, ExecutorConfig, ExecutorFactory, ExecutorMetadata};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Question put to the caller by [`ApprovalExecutor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub prompt: String,
    /// Kind of the held message, restored when it is forwarded
    pub kind: MessageKind,
    pub subject: serde_json::Value,
}

impl Payload for ApprovalRequest {
    const KIND: &'static str = "approval_request";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalResponse {
    pub approved: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

impl Payload for ApprovalResponse {
    const KIND: &'static str = "approval_response";
}

impl ApprovalResponse {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::new(
            Self::KIND,
            Value::Json(json!({ "approved": self.approved, "reason": self.reason })),
        )
    }
}

/// Holds every message until the caller approves or denies it
///
/// Each decision is yielded as an output. Approved messages are forwarded
/// downstream unchanged; denied ones stop here.
pub struct ApprovalExecutor {
    id: String,
    prompt: String,
    accepts: Vec<String>,
}

impl ApprovalExecutor {
    pub fn new(id: impl Into<String>, prompt: impl Into<String>, accepts: Vec<String>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            accepts,
        }
    }

    async fn bump(ctx: &WorkflowContext, key: &str) -> i64 {
        let count = ctx.get_state(key).await.and_then(|v| v.as_i64()).unwrap_or(0) + 1;
        ctx.set_state(key, count).await;
        count
    }
}

#[async_trait]
impl Executor for ApprovalExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        self.accepts
            .iter()
            .fold(Capabilities::new(), |caps, kind| caps.accepts_kind(kind.as_str()))
            .responds_to::<ApprovalRequest, ApprovalResponse>()
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        let request = ApprovalRequest {
            prompt: self.prompt.clone(),
            kind: message.kind.clone(),
            subject: message.body.to_json(),
        };
        let request_id = ctx.request_payload::<ApprovalRequest, ApprovalResponse>(&request)?;
        tracing::info!("{} waiting for approval ({})", self.id, request_id);
        Ok(())
    }

    async fn handle_response(
        &self,
        request: Message,
        response: Message,
        ctx: &mut WorkflowContext,
    ) -> Result<(), ExecutorError> {
        let request: ApprovalRequest = request.to_payload()?;
        let response: ApprovalResponse = response.to_payload()?;

        let key = if response.approved { "approved" } else { "denied" };
        let count = Self::bump(ctx, key).await;
        tracing::info!("{} {} request {:?} ({} so far)", self.id, key, ctx.request_id(), count);

        ctx.yield_output(Value::Json(json!({
            "request_id": ctx.request_id(),
            "approved": response.approved,
            "reason": response.reason,
            "value": request.subject,
        })));
        if response.approved {
            ctx.send_message(Message::new(request.kind, Value::from_json(request.subject)));
        }
        Ok(())
    }
}

pub struct ApprovalExecutorFactory;

impl ExecutorFactory for ApprovalExecutorFactory {
    fn create(&self, id: &str, config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError> {
        let prompt = config_str(config, "prompt")?.unwrap_or("Approve?");
        Ok(Arc::new(ApprovalExecutor::new(id, prompt, accepted_kinds(config)?)))
    }

    fn executor_type(&self) -> &str {
        "human.approval"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Ask the caller to approve each message before forwarding it".to_string(),
            category: "human".to_string(),
            accepts: vec!["text".to_string(), "number".to_string()],
            emits: vec!["text".to_string(), "number".to_string()],
        }
    }
}
