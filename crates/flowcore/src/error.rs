use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Workflow is already running. Concurrent executions are not allowed.")]
    ConcurrentRunRejected,

    #[error("Must provide at least one of 'message' or 'responses'")]
    MissingInput,

    #[error("Cannot provide both 'message' and 'responses'")]
    ConflictingInput,

    #[error("No pending request found for request id: {0}")]
    InvalidRequestId(String),

    #[error("Response for request {request_id} has kind '{actual}', expected '{expected}'")]
    ResponseTypeMismatch {
        request_id: String,
        expected: String,
        actual: String,
    },

    #[error("Executor error: {0}")]
    Executor(#[from] ExecutorError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    /// Classify this error for event reporting and caller matching
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::ConcurrentRunRejected => ErrorKind::ConcurrentRunRejected,
            FlowError::MissingInput => ErrorKind::MissingInput,
            FlowError::ConflictingInput => ErrorKind::ConflictingInput,
            FlowError::InvalidRequestId(_) => ErrorKind::InvalidRequestId,
            FlowError::ResponseTypeMismatch { .. } => ErrorKind::ResponseTypeMismatch,
            FlowError::Executor(_) => ErrorKind::ExecutorFailure,
            FlowError::Workflow(_) => ErrorKind::InvalidWorkflow,
            FlowError::Execution(_) | FlowError::Io(_) | FlowError::Serialization(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Coarse error classification carried by `failed` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConcurrentRunRejected,
    MissingInput,
    ConflictingInput,
    InvalidRequestId,
    ResponseTypeMismatch,
    ExecutorFailure,
    MaxSuperstepsExceeded,
    InvalidWorkflow,
    Internal,
}

/// Errors raised by executor handlers
#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    #[error("Executor '{executor}' has no handler for message kind '{kind}'")]
    UnsupportedMessage { executor: String, kind: String },

    #[error("Executor '{executor}' has no response handler for '{request_kind}' -> '{response_kind}'")]
    NoResponseHandler {
        executor: String,
        request_kind: String,
        response_kind: String,
    },

    #[error("Invalid payload for kind '{kind}': {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Executor panicked: {0}")]
    Panicked(String),
}

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid workflow: {0}")]
    Invalid(String),

    #[error("Executor not found: {0}")]
    ExecutorNotFound(String),

    #[error("Duplicate executor id: {0}")]
    DuplicateExecutor(String),

    #[error("Executor '{0}' is not reachable from the start executor")]
    Unreachable(String),

    #[error("Unknown executor type: {0}")]
    UnknownExecutorType(String),

    #[error("Start executor '{executor}' does not accept message kind '{kind}'")]
    UnsupportedMessage { executor: String, kind: String },
}
