use crate::graph::WorkflowBuilder;
use crate::registry::ExecutorRegistry;
use crate::runtime::{RuntimeConfig, Workflow};
use flowcore::{ExecutorRef, FlowError, WorkflowDefinition, WorkflowError};
use std::collections::HashMap;
use std::path::Path;

/// Instantiate every executor of a definition and build the workflow
pub fn build_workflow(
    definition: &WorkflowDefinition,
    registry: &ExecutorRegistry,
) -> Result<Workflow, FlowError> {
    let mut executors: HashMap<&str, ExecutorRef> = HashMap::new();
    for spec in &definition.executors {
        if executors.contains_key(spec.id.as_str()) {
            return Err(WorkflowError::DuplicateExecutor(spec.id.clone()).into());
        }
        let executor = registry.create_executor(&spec.executor_type, &spec.id, &spec.config)?;
        executors.insert(spec.id.as_str(), executor);
    }

    let start = executors
        .get(definition.start.as_str())
        .cloned()
        .ok_or_else(|| WorkflowError::ExecutorNotFound(definition.start.clone()))?;

    let mut builder = WorkflowBuilder::new(start)
        .with_name(definition.name.clone())
        .with_config(RuntimeConfig::from(&definition.settings));
    for spec in &definition.executors {
        if let Some(executor) = executors.get(spec.id.as_str()) {
            builder = builder.add_executor(executor.clone());
        }
    }
    for edge in &definition.edges {
        builder = builder.connect(edge.from.clone(), edge.to.clone());
    }

    tracing::info!(
        "Loaded workflow '{}' with {} executors",
        definition.name,
        definition.executors.len()
    );
    Ok(builder.build()?)
}

/// Parse a JSON definition and build the workflow
pub fn parse_workflow(json: &str, registry: &ExecutorRegistry) -> Result<Workflow, FlowError> {
    let definition: WorkflowDefinition = serde_json::from_str(json)?;
    build_workflow(&definition, registry)
}

/// Read a JSON definition file and build the workflow
pub fn load_workflow(
    path: impl AsRef<Path>,
    registry: &ExecutorRegistry,
) -> Result<Workflow, FlowError> {
    let path = path.as_ref();
    tracing::debug!("Loading workflow definition from {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_workflow(&content, registry)
}
