//! Standard executor library
//!
//! Collection of built-in executors for common operations: text transforms,
//! counting, delays, logging and a human approval gate.

mod approval;
mod counter;
mod debug;
mod time;
mod transform;

pub use approval::{ApprovalExecutor, ApprovalExecutorFactory, ApprovalRequest, ApprovalResponse};
pub use counter::{IncrementExecutor, IncrementExecutorFactory};
pub use debug::{LogExecutor, LogExecutorFactory};
pub use time::{DelayExecutor, DelayExecutorFactory};
pub use transform::{
    ReverseTextExecutor, ReverseTextExecutorFactory, UpperCaseExecutor, UpperCaseExecutorFactory,
    ValidateTextExecutor, ValidateTextExecutorFactory,
};

use flowcore::{ExecutorError, Message};
use flowruntime::{ExecutorConfig, ExecutorRegistry};
use std::sync::Arc;

/// Kind of plain text messages
pub const TEXT: &str = "text";
/// Kind of integer messages
pub const NUMBER: &str = "number";

pub fn text(body: impl Into<String>) -> Message {
    Message::new(TEXT, body.into())
}

pub fn number(n: i64) -> Message {
    Message::new(NUMBER, n)
}

/// Register all standard executors with a registry
pub fn register_all(registry: &mut ExecutorRegistry) {
    registry.register(Arc::new(transform::UpperCaseExecutorFactory));
    registry.register(Arc::new(transform::ReverseTextExecutorFactory));
    registry.register(Arc::new(transform::ValidateTextExecutorFactory));
    registry.register(Arc::new(counter::IncrementExecutorFactory));
    registry.register(Arc::new(time::DelayExecutorFactory));
    registry.register(Arc::new(debug::LogExecutorFactory));
    registry.register(Arc::new(approval::ApprovalExecutorFactory));
}

/// Kinds listed under `accepts`, or text and number when absent
pub(crate) fn accepted_kinds(config: &ExecutorConfig) -> Result<Vec<String>, ExecutorError> {
    match config.get("accepts") {
        None | Some(serde_json::Value::Null) => Ok(vec![TEXT.to_string(), NUMBER.to_string()]),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ExecutorError::Configuration(format!("'accepts' entries must be strings, got {}", item))
                })
            })
            .collect(),
        Some(other) => Err(ExecutorError::Configuration(format!(
            "'accepts' must be a list of message kinds, got {}",
            other
        ))),
    }
}

pub(crate) fn expect_text(message: &Message) -> Result<&str, ExecutorError> {
    message.body.as_str().ok_or_else(|| ExecutorError::InvalidPayload {
        kind: message.kind.clone(),
        reason: "expected a string body".to_string(),
    })
}
