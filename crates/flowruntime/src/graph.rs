use crate::{RuntimeConfig, Workflow};
use flowcore::{Capabilities, ExecutorId, ExecutorRef, WorkflowError};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Immutable executor graph shared by every run of a workflow
pub struct WorkflowGraph {
    name: String,
    start: ExecutorId,
    /// Registration order, used for stable listings
    order: Vec<ExecutorId>,
    executors: HashMap<ExecutorId, ExecutorRef>,
    capabilities: HashMap<ExecutorId, Capabilities>,
    successors: HashMap<ExecutorId, Vec<ExecutorId>>,
}

impl WorkflowGraph {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start_executor_id(&self) -> &str {
        &self.start
    }

    pub fn executor(&self, id: &str) -> Option<&ExecutorRef> {
        self.executors.get(id)
    }

    pub fn executor_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn capabilities(&self, id: &str) -> Option<&Capabilities> {
        self.capabilities.get(id)
    }

    /// Edge targets of `id`, in the order the edges were added
    pub fn successors(&self, id: &str) -> &[ExecutorId] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge_count(&self) -> usize {
        self.successors.values().map(Vec::len).sum()
    }

    /// Resolve the receivers of a message of `kind` sent by `source`
    ///
    /// Every edge target whose dispatch table accepts the kind receives the
    /// message; `target` narrows delivery to one of those edges.
    pub fn route(&self, source: &str, kind: &str, target: Option<&str>) -> Vec<ExecutorId> {
        self.successors(source)
            .iter()
            .filter(|id| target.map_or(true, |t| t == id.as_str()))
            .filter(|id| {
                self.capabilities
                    .get(id.as_str())
                    .is_some_and(|caps| caps.can_handle(kind))
            })
            .cloned()
            .collect()
    }
}

/// Collects executors and edges, then validates them into a [`Workflow`]
pub struct WorkflowBuilder {
    name: String,
    start: ExecutorId,
    executors: Vec<ExecutorRef>,
    edges: Vec<(ExecutorId, ExecutorId)>,
    config: RuntimeConfig,
    duplicates: Vec<ExecutorId>,
}

impl WorkflowBuilder {
    pub fn new(start: ExecutorRef) -> Self {
        let mut builder = Self {
            name: "workflow".to_string(),
            start: start.id().to_string(),
            executors: Vec::new(),
            edges: Vec::new(),
            config: RuntimeConfig::default(),
            duplicates: Vec::new(),
        };
        builder.register(&start);
        builder
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn add_executor(mut self, executor: ExecutorRef) -> Self {
        self.register(&executor);
        self
    }

    pub fn add_edge(mut self, from: &ExecutorRef, to: &ExecutorRef) -> Self {
        self.register(from);
        self.register(to);
        self.edges
            .push((from.id().to_string(), to.id().to_string()));
        self
    }

    /// One source, many targets
    pub fn add_fan_out_edges(mut self, from: &ExecutorRef, targets: &[ExecutorRef]) -> Self {
        for target in targets {
            self = self.add_edge(from, target);
        }
        self
    }

    /// Many sources, one target
    pub fn add_fan_in_edges(mut self, sources: &[ExecutorRef], to: &ExecutorRef) -> Self {
        for source in sources {
            self = self.add_edge(source, to);
        }
        self
    }

    /// Add an edge between already registered executors by id
    pub fn connect(mut self, from: impl Into<ExecutorId>, to: impl Into<ExecutorId>) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn build(self) -> Result<Workflow, WorkflowError> {
        let config = self.config.clone();
        let graph = self.build_graph()?;
        Ok(Workflow::new(graph, config))
    }

    /// Validate and freeze the graph without creating a workflow instance
    pub fn build_graph(self) -> Result<WorkflowGraph, WorkflowError> {
        if let Some(id) = self.duplicates.first() {
            return Err(WorkflowError::DuplicateExecutor(id.clone()));
        }
        if self.config.max_supersteps == 0 {
            return Err(WorkflowError::Invalid(
                "max_supersteps must be at least 1".to_string(),
            ));
        }

        let mut graph = DiGraph::<ExecutorId, ()>::new();
        let mut node_to_index: HashMap<ExecutorId, NodeIndex> = HashMap::new();
        for executor in &self.executors {
            let idx = graph.add_node(executor.id().to_string());
            node_to_index.insert(executor.id().to_string(), idx);
        }

        let mut successors: HashMap<ExecutorId, Vec<ExecutorId>> = HashMap::new();
        let mut seen_edges = HashSet::new();
        for (from, to) in &self.edges {
            let from_idx = node_to_index
                .get(from)
                .ok_or_else(|| WorkflowError::ExecutorNotFound(from.clone()))?;
            let to_idx = node_to_index
                .get(to)
                .ok_or_else(|| WorkflowError::ExecutorNotFound(to.clone()))?;

            if !seen_edges.insert((from.clone(), to.clone())) {
                tracing::debug!("Ignoring duplicate edge {} -> {}", from, to);
                continue;
            }
            graph.add_edge(*from_idx, *to_idx, ());
            successors.entry(from.clone()).or_default().push(to.clone());
        }

        // Every executor must be reachable from the start executor
        let start_idx = node_to_index
            .get(&self.start)
            .ok_or_else(|| WorkflowError::ExecutorNotFound(self.start.clone()))?;
        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(&graph, *start_idx);
        while let Some(idx) = dfs.next(&graph) {
            reachable.insert(idx);
        }
        for executor in &self.executors {
            if !reachable.contains(&node_to_index[executor.id()]) {
                return Err(WorkflowError::Unreachable(executor.id().to_string()));
            }
        }

        let capabilities = self
            .executors
            .iter()
            .map(|e| (e.id().to_string(), e.capabilities()))
            .collect();
        let order = self.executors.iter().map(|e| e.id().to_string()).collect();
        let executors = self
            .executors
            .into_iter()
            .map(|e| (e.id().to_string(), e))
            .collect();

        tracing::debug!(
            "Built workflow graph '{}' with {} executors and {} edges",
            self.name,
            node_to_index.len(),
            graph.edge_count()
        );

        Ok(WorkflowGraph {
            name: self.name,
            start: self.start,
            order,
            executors,
            capabilities,
            successors,
        })
    }

    fn register(&mut self, executor: &ExecutorRef) {
        match self.executors.iter().find(|e| e.id() == executor.id()) {
            Some(existing) if same_instance(existing, executor) => {}
            Some(_) => self.duplicates.push(executor.id().to_string()),
            None => self.executors.push(executor.clone()),
        }
    }
}

fn same_instance(a: &ExecutorRef, b: &ExecutorRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const u8, Arc::as_ptr(b) as *const u8)
}
