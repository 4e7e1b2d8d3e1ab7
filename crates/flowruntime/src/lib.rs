//! Workflow execution runtime
//!
//! This crate provides the engine that runs executor graphs in supersteps,
//! correlates external requests with their responses, guards each workflow
//! instance against concurrent runs and exposes runs either synchronously or
//! through a pollable background handle.

mod background;
mod graph;
mod loader;
mod registry;
mod runner;
mod runtime;
mod state;

pub use background::BackgroundRunHandle;
pub use graph::{WorkflowBuilder, WorkflowGraph};
pub use loader::{build_workflow, load_workflow, parse_workflow};
pub use registry::{
    config_i64, config_str, ExecutorConfig, ExecutorFactory, ExecutorMetadata, ExecutorRegistry,
};
pub use runtime::{RunRequest, RuntimeConfig, Workflow, WorkflowRunResult};
