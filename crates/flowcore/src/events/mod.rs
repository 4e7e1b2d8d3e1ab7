// crates/flowcore/src/events/mod.rs

mod base;
mod queue;

pub use base::{FailureDetails, RunId, WorkflowEvent};
pub use queue::{event_queue, EventEmitter, EventQueue};
