use crate::{number, NUMBER};
use async_trait::async_trait;
use flowcore::{Capabilities, Executor, ExecutorError, ExecutorRef, Message, WorkflowContext};
use flowruntime::{config_i64, ExecutorConfig, ExecutorFactory, ExecutorMetadata};
use std::sync::Arc;

/// Adds `increment` to a number and forwards it
///
/// With a `limit`, a result at or beyond it is yielded as output instead of
/// forwarded, which makes the executor usable on either end of a loop.
pub struct IncrementExecutor {
    id: String,
    increment: i64,
    limit: Option<i64>,
}

impl IncrementExecutor {
    pub fn new(id: impl Into<String>, increment: i64, limit: Option<i64>) -> Self {
        Self {
            id: id.into(),
            increment,
            limit,
        }
    }
}

#[async_trait]
impl Executor for IncrementExecutor {
    fn id(&self) -> &str {
        &self.id
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().accepts_kind(NUMBER)
    }

    async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        let current = message.body.as_i64().ok_or_else(|| ExecutorError::InvalidPayload {
            kind: message.kind.clone(),
            reason: "expected an integer body".to_string(),
        })?;
        let next = current
            .checked_add(self.increment)
            .ok_or_else(|| ExecutorError::ExecutionFailed(format!("{} + {} overflows", current, self.increment)))?;

        match self.limit {
            Some(limit) if next >= limit => {
                tracing::debug!("{} reached limit {} with {}", self.id, limit, next);
                ctx.yield_output(next);
            }
            _ => ctx.send_message(number(next)),
        }
        Ok(())
    }
}

pub struct IncrementExecutorFactory;

impl ExecutorFactory for IncrementExecutorFactory {
    fn create(&self, id: &str, config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError> {
        let increment = config_i64(config, "increment")?.unwrap_or(1);
        let limit = config_i64(config, "limit")?;
        Ok(Arc::new(IncrementExecutor::new(id, increment, limit)))
    }

    fn executor_type(&self) -> &str {
        "number.increment"
    }

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata {
            description: "Add to a number; yield it once a limit is reached".to_string(),
            category: "number".to_string(),
            accepts: vec![NUMBER.to_string()],
            emits: vec![NUMBER.to_string()],
        }
    }
}
