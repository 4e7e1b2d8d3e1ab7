#![allow(dead_code)]

use async_trait::async_trait;
use flowcore::{
    Capabilities, Executor, ExecutorError, ExecutorRef, Message, Value, WorkflowContext,
    WorkflowEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const NUMBER: &str = "number";
pub const APPROVAL_REQUEST: &str = "approval_request";
pub const APPROVAL_RESPONSE: &str = "approval_response";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn number(n: i64) -> Message {
    Message::new(NUMBER, n)
}

pub fn approval(approved: bool) -> Message {
    Message::new(APPROVAL_RESPONSE, approved)
}

fn read_number(message: &Message) -> Result<i64, ExecutorError> {
    message.body.as_i64().ok_or_else(|| ExecutorError::InvalidPayload {
        kind: message.kind.clone(),
        reason: "expected an integer".to_string(),
    })
}

/// Adds one and forwards, or yields once `limit` is reached
pub struct Incrementer {
    id: String,
    limit: i64,
}

pub fn incrementer(id: &str, limit: i64) -> ExecutorRef {
    Arc::new(Incrementer {
        id: id.to_string(),
        limit,
    })
}

#[async_trait]
impl Executor for Incrementer {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(NUMBER)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        let next = read_number(&message)? + 1;
        if next >= self.limit {
            ctx.yield_output(next);
        } else {
            ctx.send_message(number(next));
        }
        Ok(())
    }
}

/// Fails on every message; negative numbers only when `only_negative` is set
pub struct Failing {
    id: String,
    only_negative: bool,
}

pub fn failing(id: &str) -> ExecutorRef {
    Arc::new(Failing {
        id: id.to_string(),
        only_negative: false,
    })
}

pub fn failing_on_negative(id: &str) -> ExecutorRef {
    Arc::new(Failing {
        id: id.to_string(),
        only_negative: true,
    })
}

#[async_trait]
impl Executor for Failing {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(NUMBER)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        let n = read_number(&message)?;
        if !self.only_negative || n < 0 {
            return Err(ExecutorError::ExecutionFailed("Intentional failure".to_string()));
        }
        ctx.yield_output(n);
        Ok(())
    }
}

/// Asks for approval of every number; yields it when approved, -1 otherwise
pub struct Gate {
    id: String,
}

pub fn gate(id: &str) -> ExecutorRef {
    Arc::new(Gate { id: id.to_string() })
}

#[async_trait]
impl Executor for Gate {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .accepts_kind(NUMBER)
            .responds_to_kinds(APPROVAL_REQUEST, APPROVAL_RESPONSE)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        ctx.request_info(Message::new(APPROVAL_REQUEST, message.body), APPROVAL_RESPONSE);
        Ok(())
    }

    async fn handle_response(
        &self,
        request: Message,
        response: Message,
        ctx: &mut WorkflowContext,
    ) -> Result<(), ExecutorError> {
        if response.body.as_bool() == Some(true) {
            ctx.yield_output(request.body);
        } else {
            ctx.yield_output(-1);
        }
        Ok(())
    }
}

/// Sends the number to itself `iterations` times, sleeping each round, then
/// yields it multiplied by 100
pub struct SlowLoop {
    id: String,
    iterations: i64,
    delay: Duration,
}

pub fn slow_loop(id: &str, iterations: i64, delay: Duration) -> ExecutorRef {
    Arc::new(SlowLoop {
        id: id.to_string(),
        iterations,
        delay,
    })
}

#[async_trait]
impl Executor for SlowLoop {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(NUMBER)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        tokio::time::sleep(self.delay).await;
        let n = read_number(&message)?;
        let round = ctx
            .get_state("round")
            .await
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            + 1;
        if round >= self.iterations {
            ctx.remove_state("round").await;
            ctx.yield_output(n * 100);
        } else {
            ctx.set_state("round", round).await;
            ctx.send_message(number(n));
        }
        Ok(())
    }
}

/// Forwards every message it accepts unchanged
pub struct Relay {
    id: String,
    kinds: Vec<&'static str>,
}

pub fn relay(id: &str, kinds: &[&'static str]) -> ExecutorRef {
    Arc::new(Relay {
        id: id.to_string(),
        kinds: kinds.to_vec(),
    })
}

#[async_trait]
impl Executor for Relay {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        self.kinds
            .iter()
            .fold(Capabilities::new(), |caps, kind| caps.accepts_kind(*kind))
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        ctx.send_message(message);
        Ok(())
    }
}

/// Yields the body of every message of its kind
pub struct Collector {
    id: String,
    kind: &'static str,
}

pub fn collector(id: &str, kind: &'static str) -> ExecutorRef {
    Arc::new(Collector {
        id: id.to_string(),
        kind,
    })
}

#[async_trait]
impl Executor for Collector {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(self.kind)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        ctx.yield_output(message.body);
        Ok(())
    }
}

/// Counts the messages it has seen in its local state
pub struct Counter {
    id: String,
}

pub fn counter(id: &str) -> ExecutorRef {
    Arc::new(Counter { id: id.to_string() })
}

#[async_trait]
impl Executor for Counter {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(NUMBER)
    }

    async fn handle(&self, _message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        let seen = ctx
            .get_state("seen")
            .await
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
            + 1;
        ctx.set_state("seen", seen).await;
        ctx.yield_output(seen);
        Ok(())
    }
}

pub struct Panicking {
    id: String,
}

pub fn panicking(id: &str) -> ExecutorRef {
    Arc::new(Panicking { id: id.to_string() })
}

#[async_trait]
impl Executor for Panicking {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(NUMBER)
    }

    async fn handle(&self, _message: Message, _ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        panic!("handler exploded");
    }
}

pub fn outputs(events: &[WorkflowEvent]) -> Vec<Value> {
    events.iter().filter_map(|e| e.as_output().cloned()).collect()
}

pub fn event_types(events: &[WorkflowEvent]) -> Vec<&'static str> {
    events.iter().map(WorkflowEvent::event_type).collect()
}

pub fn statuses(events: &[WorkflowEvent]) -> Vec<flowcore::RunState> {
    events.iter().filter_map(WorkflowEvent::as_status).collect()
}

pub fn request_ids(events: &[WorkflowEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| e.request_id().map(str::to_string))
        .collect()
}
