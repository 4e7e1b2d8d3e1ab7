use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a workflow instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// No run in flight and nothing pending
    #[default]
    Idle,
    Running,
    /// Converged, but at least one request awaits an external response
    IdleWithPendingRequests,
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "IDLE",
            RunState::Running => "RUNNING",
            RunState::IdleWithPendingRequests => "IDLE_WITH_PENDING_REQUESTS",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
