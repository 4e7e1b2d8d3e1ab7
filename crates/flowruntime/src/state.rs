use crate::runner::Delivery;
use flowcore::{FlowError, Message, PendingRequest, RequestId, RunState};
use std::collections::HashSet;

/// What `respond` did with a batch of responses
#[derive(Debug)]
pub(crate) enum RespondOutcome {
    /// Joined the run already in flight
    Absorbed,
    /// The workflow had converged; a new superstep loop must be started
    Restart(Vec<Delivery>),
}

/// Run state, pending-request table and mid-run response inbox of one
/// workflow instance
///
/// Always accessed under the instance's mutex, so every check-and-set below
/// is atomic with respect to other callers and to the running scheduler.
#[derive(Debug, Default)]
pub(crate) struct RunStateMachine {
    state: RunState,
    pending: Vec<PendingRequest>,
    injected: Vec<Delivery>,
}

impl RunStateMachine {
    pub(crate) fn state(&self) -> RunState {
        self.state
    }

    pub(crate) fn pending(&self) -> &[PendingRequest] {
        &self.pending
    }

    fn ensure_not_running(&self) -> Result<(), FlowError> {
        if self.state == RunState::Running {
            return Err(FlowError::ConcurrentRunRejected);
        }
        Ok(())
    }

    /// Start a run from a new initial message
    ///
    /// Requests left over from an earlier run are abandoned.
    pub(crate) fn begin_fresh(&mut self) -> Result<(), FlowError> {
        self.ensure_not_running()?;
        if !self.pending.is_empty() {
            tracing::debug!("Abandoning {} pending requests", self.pending.len());
        }
        self.pending.clear();
        self.injected.clear();
        self.state = RunState::Running;
        Ok(())
    }

    /// Start a run that resumes pending requests
    pub(crate) fn begin_with_responses(
        &mut self,
        responses: Vec<(RequestId, Message)>,
    ) -> Result<Vec<Delivery>, FlowError> {
        self.ensure_not_running()?;
        let deliveries = self.resolve(responses)?;
        self.state = RunState::Running;
        Ok(deliveries)
    }

    /// Answer pending requests, joining the in-flight run if there is one
    pub(crate) fn respond(
        &mut self,
        responses: Vec<(RequestId, Message)>,
    ) -> Result<RespondOutcome, FlowError> {
        if responses.is_empty() {
            return Ok(RespondOutcome::Absorbed);
        }
        let deliveries = self.resolve(responses)?;
        if self.state == RunState::Running {
            self.injected.extend(deliveries);
            Ok(RespondOutcome::Absorbed)
        } else {
            // Entries only survive a converged run as IDLE_WITH_PENDING_REQUESTS
            self.state = RunState::Running;
            Ok(RespondOutcome::Restart(deliveries))
        }
    }

    /// Validate the whole batch, then remove the matching entries
    fn resolve(
        &mut self,
        responses: Vec<(RequestId, Message)>,
    ) -> Result<Vec<Delivery>, FlowError> {
        let mut seen = HashSet::new();
        for (request_id, response) in &responses {
            if !seen.insert(request_id.as_str()) {
                return Err(FlowError::InvalidRequestId(request_id.clone()));
            }
            let pending = self
                .pending
                .iter()
                .find(|p| &p.request_id == request_id)
                .ok_or_else(|| FlowError::InvalidRequestId(request_id.clone()))?;
            if pending.response_kind != response.kind {
                return Err(FlowError::ResponseTypeMismatch {
                    request_id: request_id.clone(),
                    expected: pending.response_kind.clone(),
                    actual: response.kind.clone(),
                });
            }
        }

        let mut deliveries = Vec::with_capacity(responses.len());
        for (request_id, response) in responses {
            if let Some(pos) = self.pending.iter().position(|p| p.request_id == request_id) {
                let pending = self.pending.remove(pos);
                deliveries.push(Delivery::Response {
                    target: pending.source_executor_id,
                    request_id: pending.request_id,
                    request: pending.request,
                    response,
                });
            }
        }
        Ok(deliveries)
    }

    pub(crate) fn register_request(&mut self, request: PendingRequest) {
        self.pending.push(request);
    }

    /// End-of-superstep bookkeeping
    ///
    /// Moves responses injected during the superstep into `next`. Returns the
    /// terminal state when nothing is left to deliver.
    pub(crate) fn converge(&mut self, next: &mut Vec<Delivery>) -> Option<RunState> {
        next.append(&mut self.injected);
        if !next.is_empty() {
            return None;
        }
        self.state = if self.pending.is_empty() {
            RunState::Idle
        } else {
            RunState::IdleWithPendingRequests
        };
        Some(self.state)
    }

    pub(crate) fn fail(&mut self) {
        self.state = RunState::Failed;
        self.pending.clear();
        self.injected.clear();
    }

    /// Release a run that stopped without reaching a terminal state
    pub(crate) fn abandon(&mut self) {
        if self.state == RunState::Running {
            self.fail();
        }
    }
}
