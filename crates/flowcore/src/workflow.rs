use crate::ExecutorId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declarative workflow definition, as stored in JSON files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Executor that receives the initial message
    pub start: ExecutorId,
    pub executors: Vec<ExecutorSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
    #[serde(default)]
    pub settings: WorkflowSettings,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, start: impl Into<ExecutorId>) -> Self {
        Self {
            name: name.into(),
            description: None,
            start: start.into(),
            executors: Vec::new(),
            edges: Vec::new(),
            settings: WorkflowSettings::default(),
        }
    }

    pub fn add_executor(&mut self, spec: ExecutorSpec) -> ExecutorId {
        let id = spec.id.clone();
        self.executors.push(spec);
        id
    }

    pub fn connect(&mut self, from: impl Into<ExecutorId>, to: impl Into<ExecutorId>) {
        self.edges.push(EdgeSpec {
            from: from.into(),
            to: to.into(),
        });
    }

    pub fn find_executor(&self, id: &str) -> Option<&ExecutorSpec> {
        self.executors.iter().find(|e| e.id == id)
    }
}

/// Executor instance in a definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSpec {
    pub id: ExecutorId,
    /// Registry key, e.g. "text.upper_case"
    #[serde(rename = "type")]
    pub executor_type: String,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

impl ExecutorSpec {
    pub fn new(id: impl Into<ExecutorId>, executor_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            executor_type: executor_type.into(),
            config: HashMap::new(),
        }
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

/// Directed edge between two executors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: ExecutorId,
    pub to: ExecutorId,
}

/// Global workflow settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default = "default_max_supersteps")]
    pub max_supersteps: usize,
}

fn default_max_supersteps() -> usize {
    100
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            max_supersteps: default_max_supersteps(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_definition() {
        let json = r#"{
            "name": "echo",
            "start": "upper",
            "executors": [
                {"id": "upper", "type": "text.upper_case"},
                {"id": "reverse", "type": "text.reverse", "config": {"note": 1}}
            ],
            "edges": [{"from": "upper", "to": "reverse"}]
        }"#;
        let def: WorkflowDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.start, "upper");
        assert_eq!(def.settings.max_supersteps, 100);
        assert_eq!(def.find_executor("reverse").unwrap().executor_type, "text.reverse");
        assert_eq!(def.edges, vec![EdgeSpec { from: "upper".into(), to: "reverse".into() }]);
    }
}
