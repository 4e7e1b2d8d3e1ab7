use crate::{ErrorKind, ExecutorId, Message, MessageKind, RequestId, RunState, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type RunId = Uuid;

/// Events emitted during workflow execution, in scheduler order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    Started {
        run_id: RunId,
        timestamp: DateTime<Utc>,
    },
    Status {
        state: RunState,
        timestamp: DateTime<Utc>,
    },
    SuperstepStarted {
        superstep: usize,
    },
    ExecutorInvoked {
        executor_id: ExecutorId,
        superstep: usize,
    },
    ExecutorCompleted {
        executor_id: ExecutorId,
        superstep: usize,
    },
    SuperstepCompleted {
        superstep: usize,
    },
    Output {
        executor_id: ExecutorId,
        data: Value,
    },
    RequestInfo {
        request_id: RequestId,
        source_executor_id: ExecutorId,
        data: Message,
        response_kind: MessageKind,
    },
    Failed {
        details: FailureDetails,
        timestamp: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    pub fn status(state: RunState) -> Self {
        WorkflowEvent::Status {
            state,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(details: FailureDetails) -> Self {
        WorkflowEvent::Failed {
            details,
            timestamp: Utc::now(),
        }
    }

    /// Wire name of the event, as used in the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            WorkflowEvent::Started { .. } => "started",
            WorkflowEvent::Status { .. } => "status",
            WorkflowEvent::SuperstepStarted { .. } => "superstep_started",
            WorkflowEvent::ExecutorInvoked { .. } => "executor_invoked",
            WorkflowEvent::ExecutorCompleted { .. } => "executor_completed",
            WorkflowEvent::SuperstepCompleted { .. } => "superstep_completed",
            WorkflowEvent::Output { .. } => "output",
            WorkflowEvent::RequestInfo { .. } => "request_info",
            WorkflowEvent::Failed { .. } => "failed",
        }
    }

    pub fn as_output(&self) -> Option<&Value> {
        match self {
            WorkflowEvent::Output { data, .. } => Some(data),
            _ => None,
        }
    }

    pub fn as_status(&self) -> Option<RunState> {
        match self {
            WorkflowEvent::Status { state, .. } => Some(*state),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            WorkflowEvent::RequestInfo { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetails {
    pub kind: ErrorKind,
    pub message: String,
    pub executor_id: Option<ExecutorId>,
}
