//! Core abstractions for the flow engine
//!
//! This crate provides the data types and contracts the engine is built on:
//! messages and values, the executor trait and its context, pending
//! requests, run states, events and errors. It has no scheduling logic.

mod error;
pub mod events;
mod executor;
mod message;
mod request;
mod state;
mod value;
mod workflow;

pub use error::{ErrorKind, ExecutorError, FlowError, WorkflowError};
pub use events::*;
pub use executor::{
    Capabilities, Effect, Executor, ExecutorId, ExecutorRef, ExecutorState, OutgoingMessage,
    WorkflowContext,
};
pub use message::{Message, MessageKind, Payload};
pub use request::{PendingRequest, RequestId};
pub use state::RunState;
pub use value::Value;
pub use workflow::{EdgeSpec, ExecutorSpec, WorkflowDefinition, WorkflowSettings};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
