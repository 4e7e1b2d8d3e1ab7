use flowcore::{ExecutorError, ExecutorRef, WorkflowError};
use std::collections::HashMap;
use std::sync::Arc;

/// Executor configuration as found in a definition file
pub type ExecutorConfig = HashMap<String, serde_json::Value>;

/// Factory trait for creating executor instances
pub trait ExecutorFactory: Send + Sync {
    /// Create a new executor with the given id and configuration
    fn create(&self, id: &str, config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError>;

    /// Registry key, e.g. "text.upper_case"
    fn executor_type(&self) -> &str;

    fn metadata(&self) -> ExecutorMetadata {
        ExecutorMetadata::default()
    }
}

/// Metadata about an executor type
#[derive(Debug, Clone)]
pub struct ExecutorMetadata {
    pub description: String,
    pub category: String,
    /// Message kinds the executor handles
    pub accepts: Vec<String>,
    /// Message kinds the executor sends
    pub emits: Vec<String>,
}

impl Default for ExecutorMetadata {
    fn default() -> Self {
        Self {
            description: String::new(),
            category: "general".to_string(),
            accepts: Vec::new(),
            emits: Vec::new(),
        }
    }
}

/// Registry of available executor types
#[derive(Default)]
pub struct ExecutorRegistry {
    factories: HashMap<String, Arc<dyn ExecutorFactory>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor factory, replacing any previous one of that type
    pub fn register(&mut self, factory: Arc<dyn ExecutorFactory>) {
        let executor_type = factory.executor_type().to_string();
        tracing::debug!("Registering executor type: {}", executor_type);
        self.factories.insert(executor_type, factory);
    }

    pub fn create_executor(
        &self,
        executor_type: &str,
        id: &str,
        config: &ExecutorConfig,
    ) -> Result<ExecutorRef, WorkflowError> {
        let factory = self
            .factories
            .get(executor_type)
            .ok_or_else(|| WorkflowError::UnknownExecutorType(executor_type.to_string()))?;

        let executor = factory.create(id, config).map_err(|e| {
            WorkflowError::Invalid(format!("Failed to create executor '{}': {}", id, e))
        })?;
        if executor.id() != id {
            return Err(WorkflowError::Invalid(format!(
                "Factory for '{}' returned executor '{}' instead of '{}'",
                executor_type,
                executor.id(),
                id
            )));
        }
        Ok(executor)
    }

    /// All registered executor types, sorted
    pub fn list_executor_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn get_metadata(&self, executor_type: &str) -> Option<ExecutorMetadata> {
        self.factories.get(executor_type).map(|f| f.metadata())
    }
}

/// Read an optional integer setting
pub fn config_i64(config: &ExecutorConfig, key: &str) -> Result<Option<i64>, ExecutorError> {
    match config.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            ExecutorError::Configuration(format!("'{}' must be an integer, got {}", key, value))
        }),
    }
}

/// Read an optional string setting
pub fn config_str<'a>(config: &'a ExecutorConfig, key: &str) -> Result<Option<&'a str>, ExecutorError> {
    match config.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(value) => value.as_str().map(Some).ok_or_else(|| {
            ExecutorError::Configuration(format!("'{}' must be a string, got {}", key, value))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flowcore::{Capabilities, Executor, Message, WorkflowContext};

    struct Echo(String);

    #[async_trait]
    impl Executor for Echo {
        fn id(&self) -> &str {
            &self.0
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::new().accepts_kind("text")
        }

        async fn handle(&self, message: Message, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
            ctx.yield_output(message.body);
            Ok(())
        }
    }

    struct EchoFactory;

    impl ExecutorFactory for EchoFactory {
        fn create(&self, id: &str, config: &ExecutorConfig) -> Result<ExecutorRef, ExecutorError> {
            config_str(config, "prefix")?;
            Ok(Arc::new(Echo(id.to_string())))
        }

        fn executor_type(&self) -> &str {
            "test.echo"
        }
    }

    #[test]
    fn creates_registered_types() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(EchoFactory));

        let executor = registry
            .create_executor("test.echo", "e1", &ExecutorConfig::new())
            .unwrap();
        assert_eq!(executor.id(), "e1");
        assert_eq!(registry.list_executor_types(), vec!["test.echo"]);
        assert_eq!(registry.get_metadata("test.echo").unwrap().category, "general");
    }

    #[test]
    fn unknown_type_and_bad_config_are_rejected() {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(EchoFactory));

        let err = registry
            .create_executor("test.missing", "e1", &ExecutorConfig::new())
            .err()
            .unwrap();
        assert!(matches!(err, WorkflowError::UnknownExecutorType(_)));

        let mut config = ExecutorConfig::new();
        config.insert("prefix".to_string(), serde_json::json!(3));
        let err = registry
            .create_executor("test.echo", "e1", &config)
            .err()
            .unwrap();
        assert!(err.to_string().contains("'prefix' must be a string"));
    }

    #[test]
    fn config_helpers_treat_null_as_absent() {
        let mut config = ExecutorConfig::new();
        config.insert("limit".to_string(), serde_json::Value::Null);
        config.insert("step".to_string(), serde_json::json!(2));
        assert_eq!(config_i64(&config, "limit").unwrap(), None);
        assert_eq!(config_i64(&config, "step").unwrap(), Some(2));
        assert!(config_i64(&config, "missing").unwrap().is_none());
    }
}
