use crate::accepted_kinds;
use async_trait::async_trait;
use flowcore::{Capabilities, Executor, ExecutorError, ExecutorRef, Message, WorkflowContext};
use flowruntime::{ExecutorConfig, ExecutorFactory, ExecutorMetadata};
use std::sync::Arc;

/// Simple debug executor that logs what passes through it
pub struct LogExecutor {
    id: String,
    accepts: Vec<String>,
    yield_output: bool,
}

impl LogExecutor {
    pub fn new(id: impl Into<String>, accepts: Vec<String>, yield_output: bool) -> Self {
        Self {
            id: id.into(),
            accepts,
            yield_output,
        }
    }
}

#[async_trait]
impl Executor for LogExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        self.accepts
            .iter()
            .fold(Capabilities::new(), |caps, kind| caps.accepts_kind(kind.as_str()))
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        tracing::info!(
            "DEBUG [{}] superstep {}: {} {}",
            self.id,
            ctx.superstep(),
            message.kind,
            message.body.to_json()
        );
        if self.yield_output {
            ctx.yield_output(message.body.clone());
        }
        ctx.send_message(message);
        Ok(())
    }
}

pub struct LogExecutorFactory;

impl ExecutorFactory for LogExecutorFactory {
    fn create(&self, id: &str, config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError> {
        let yield_output = match config.get("yield_output") {
            None | Some(serde_json::Value::Null) => false,
            Some(serde_json::Value::Bool(b)) => *b,
            Some(other) => {
                return Err(ExecutorError::Configuration(format!(
                    "'yield_output' must be a boolean, got {}",
                    other
                )))
            }
        };
        Ok(Arc::new(LogExecutor::new(id, accepted_kinds(config)?, yield_output)))
    }

    fn executor_type(&self) -> &str {
        "debug.log"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Logs messages for debugging and forwards them".to_string(),
            category: "debug".to_string(),
            accepts: vec!["text".to_string(), "number".to_string()],
            emits: vec!["text".to_string(), "number".to_string()],
        }
    }
}
