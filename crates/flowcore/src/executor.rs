use crate::{ExecutorError, Message, MessageKind, Payload, PendingRequest, RequestId, Value};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

pub type ExecutorId = String;

/// Shared handle to an executor registered in a graph
pub type ExecutorRef = Arc<dyn Executor>;

/// Core trait that all executors implement
///
/// An executor is constructed once and reused across runs. It never talks to
/// other executors directly: everything it sends, yields or asks for goes
/// through the [`WorkflowContext`] it is handed.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Stable identifier, unique within a graph
    fn id(&self) -> &str;

    /// Message kinds and response pairs this executor handles
    fn capabilities(&self) -> Capabilities;

    /// Handle a message whose kind is listed in `capabilities().accepts`
    async fn handle(&self, message: Message, ctx: &mut WorkflowContext)
        -> Result<(), ExecutorError>;

    /// Handle the response to a request this executor issued earlier
    async fn handle_response(
        &self,
        request: Message,
        response: Message,
        _ctx: &mut WorkflowContext,
    ) -> Result<(), ExecutorError> {
        Err(ExecutorError::NoResponseHandler {
            executor: self.id().to_string(),
            request_kind: request.kind,
            response_kind: response.kind,
        })
    }
}

/// Dispatch table entry for one executor, fixed when the graph is built
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    accepts: HashSet<MessageKind>,
    responses: HashSet<(MessageKind, MessageKind)>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepts_kind(mut self, kind: impl Into<MessageKind>) -> Self {
        self.accepts.insert(kind.into());
        self
    }

    pub fn accepts<P: Payload>(self) -> Self {
        self.accepts_kind(P::KIND)
    }

    pub fn responds_to_kinds(
        mut self,
        request_kind: impl Into<MessageKind>,
        response_kind: impl Into<MessageKind>,
    ) -> Self {
        self.responses
            .insert((request_kind.into(), response_kind.into()));
        self
    }

    pub fn responds_to<Req: Payload, Resp: Payload>(self) -> Self {
        self.responds_to_kinds(Req::KIND, Resp::KIND)
    }

    pub fn can_handle(&self, kind: &str) -> bool {
        self.accepts.contains(kind)
    }

    pub fn can_handle_response(&self, request_kind: &str, response_kind: &str) -> bool {
        self.responses
            .iter()
            .any(|(req, resp)| req == request_kind && resp == response_kind)
    }

    pub fn accepted_kinds(&self) -> impl Iterator<Item = &str> {
        self.accepts.iter().map(String::as_str)
    }
}

/// Local key-value state of an executor instance
///
/// Survives across supersteps and across runs of the same workflow.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ExecutorState {
    pub data: HashMap<String, Value>,
}

/// A message sent by a handler, routed after the handler returns
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub message: Message,
    /// Restrict delivery to one edge target
    pub target: Option<ExecutorId>,
}

/// Observable effect of a handler, in the order it was produced
#[derive(Debug, Clone)]
pub enum Effect {
    Output(Value),
    Request(PendingRequest),
}

/// Execution context passed to each handler invocation
pub struct WorkflowContext {
    executor_id: ExecutorId,
    superstep: usize,
    request_id: Option<RequestId>,
    state: Arc<RwLock<ExecutorState>>,
    outbox: Vec<OutgoingMessage>,
    effects: Vec<Effect>,
}

impl WorkflowContext {
    pub fn new(
        executor_id: impl Into<ExecutorId>,
        superstep: usize,
        state: Arc<RwLock<ExecutorState>>,
    ) -> Self {
        Self {
            executor_id: executor_id.into(),
            superstep,
            request_id: None,
            state,
            outbox: Vec::new(),
            effects: Vec::new(),
        }
    }

    /// Mark this context as serving the response to `request_id`
    pub fn for_response(mut self, request_id: impl Into<RequestId>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    pub fn superstep(&self) -> usize {
        self.superstep
    }

    /// Id of the request being answered, inside a response handler
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Send to every edge target that accepts the message kind
    pub fn send_message(&mut self, message: Message) {
        self.outbox.push(OutgoingMessage {
            message,
            target: None,
        });
    }

    /// Send to a single edge target
    pub fn send_message_to(&mut self, target: impl Into<ExecutorId>, message: Message) {
        self.outbox.push(OutgoingMessage {
            message,
            target: Some(target.into()),
        });
    }

    /// Produce a workflow output; does not end the run
    pub fn yield_output(&mut self, value: impl Into<Value>) {
        self.effects.push(Effect::Output(value.into()));
    }

    /// Ask the caller for input; the response arrives at `handle_response`
    pub fn request_info(
        &mut self,
        request: Message,
        response_kind: impl Into<MessageKind>,
    ) -> RequestId {
        let pending = PendingRequest::new(self.executor_id.clone(), request, response_kind);
        let request_id = pending.request_id.clone();
        self.effects.push(Effect::Request(pending));
        request_id
    }

    pub fn request_payload<Req: Payload, Resp: Payload>(
        &mut self,
        request: &Req,
    ) -> Result<RequestId, ExecutorError> {
        let message = Message::from_payload(request).map_err(|e| ExecutorError::InvalidPayload {
            kind: Req::KIND.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.request_info(message, Resp::KIND))
    }

    pub async fn get_state(&self, key: &str) -> Option<Value> {
        self.state.read().await.data.get(key).cloned()
    }

    pub async fn set_state(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.state
            .write()
            .await
            .data
            .insert(key.into(), value.into());
    }

    pub async fn remove_state(&self, key: &str) -> Option<Value> {
        self.state.write().await.data.remove(key)
    }

    /// Split into what the handler sent and what it produced
    pub fn into_parts(self) -> (Vec<OutgoingMessage>, Vec<Effect>) {
        (self.outbox, self.effects)
    }
}
