use crate::{expect_text, text, TEXT};
use async_trait::async_trait;
use flowcore::{Capabilities, Executor, ExecutorError, ExecutorRef, Message, WorkflowContext};
use flowruntime::{config_i64, ExecutorConfig, ExecutorFactory, ExecutorMetadata};
use std::sync::Arc;

/// Upper-cases text and forwards it
pub struct UpperCaseExecutor {
    id: String,
}

impl UpperCaseExecutor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Executor for UpperCaseExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(TEXT)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        let upper = expect_text(&message)?.to_uppercase();
        ctx.send_message(text(upper));
        Ok(())
    }
}

pub struct UpperCaseExecutorFactory;

impl ExecutorFactory for UpperCaseExecutorFactory {
    fn create(&self, id: &str, _config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError> {
        Ok(Arc::new(UpperCaseExecutor::new(id)))
    }

    fn executor_type(&self) -> &str {
        "text.upper_case"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Convert text to upper case".to_string(),
            category: "transform".to_string(),
            accepts: vec![TEXT.to_string()],
            emits: vec![TEXT.to_string()],
        }
    }
}

/// Reverses text, yields it as a workflow output and forwards it
pub struct ReverseTextExecutor {
    id: String,
}

impl ReverseTextExecutor {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Executor for ReverseTextExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(TEXT)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        let reversed: String = expect_text(&message)?.chars().rev().collect();
        ctx.yield_output(reversed.clone());
        ctx.send_message(text(reversed));
        Ok(())
    }
}

pub struct ReverseTextExecutorFactory;

impl ExecutorFactory for ReverseTextExecutorFactory {
    fn create(&self, id: &str, _config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError> {
        Ok(Arc::new(ReverseTextExecutor::new(id)))
    }

    fn executor_type(&self) -> &str {
        "text.reverse"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Reverse text and yield it as output".to_string(),
            category: "transform".to_string(),
            accepts: vec![TEXT.to_string()],
            emits: vec![TEXT.to_string()],
        }
    }
}

/// Rejects blank or too short text, forwards everything else
pub struct ValidateTextExecutor {
    id: String,
    min_length: usize,
}

impl ValidateTextExecutor {
    pub fn new(id: impl Into<String>, min_length: usize) -> Self {
        Self {
            id: id.into(),
            min_length,
        }
    }
}

#[async_trait]
impl Executor for ValidateTextExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(TEXT)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        let input = expect_text(&message)?;
        if input.trim().is_empty() {
            return Err(ExecutorError::ExecutionFailed(
                "Input text must not be empty".to_string(),
            ));
        }
        if input.chars().count() < self.min_length {
            return Err(ExecutorError::ExecutionFailed(format!(
                "Input text must be at least {} characters",
                self.min_length
            )));
        }
        ctx.send_message(message);
        Ok(())
    }
}

pub struct ValidateTextExecutorFactory;

impl ExecutorFactory for ValidateTextExecutorFactory {
    fn create(&self, id: &str, config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError> {
        let min_length = config_i64(config, "min_length")?.unwrap_or(1);
        let min_length = usize::try_from(min_length).map_err(|_| {
            ExecutorError::Configuration(format!("'min_length' must not be negative, got {}", min_length))
        })?;
        Ok(Arc::new(ValidateTextExecutor::new(id, min_length)))
    }

    fn executor_type(&self) -> &str {
        "text.validate"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Fail the run on blank or too short text".to_string(),
            category: "transform".to_string(),
            accepts: vec![TEXT.to_string()],
            emits: vec![TEXT.to_string()],
        }
    }
}
