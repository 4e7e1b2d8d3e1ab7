use crate::accepted_kinds;
use async_trait::async_trait;
use flowcore::{Capabilities, Executor, ExecutorError, ExecutorRef, Message, WorkflowContext};
use flowruntime::{config_i64, ExecutorConfig, ExecutorFactory, ExecutorMetadata};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

/// Delay a message for a fixed duration, then forward it unchanged
pub struct DelayExecutor {
    id: String,
    delay: Duration,
    accepts: Vec<String>,
}

impl DelayExecutor {
    pub fn new(id: impl Into<String>, delay: Duration, accepts: Vec<String>) -> Self {
        Self {
            id: id.into(),
            delay,
            accepts,
        }
    }
}

#[async_trait]
impl Executor for DelayExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        self.accepts
            .iter()
            .fold(Capabilities::new(), |caps, kind| caps.accepts_kind(kind.as_str()))
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        tracing::debug!("Delaying {} for {}ms", message.kind, self.delay.as_millis());
        sleep(self.delay).await;
        ctx.send_message(message);
        Ok(())
    }
}

pub struct DelayExecutorFactory;

impl ExecutorFactory for DelayExecutorFactory {
    fn create(&self, id: &str, config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError> {
        // Default to 1 second if not specified
        let delay_ms = config_i64(config, "delay_ms")?.unwrap_or(1000);
        let delay_ms = u64::try_from(delay_ms).map_err(|_| {
            ExecutorError::Configuration(format!("'delay_ms' must not be negative, got {}", delay_ms))
        })?;
        Ok(Arc::new(DelayExecutor::new(
            id,
            Duration::from_millis(delay_ms),
            accepted_kinds(config)?,
        )))
    }

    fn executor_type(&self) -> &str {
        "time.delay"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Delay messages for specified milliseconds".to_string(),
            category: "time".to_string(),
            accepts: vec!["text".to_string(), "number".to_string()],
            emits: vec!["text".to_string(), "number".to_string()],
        }
    }
}
