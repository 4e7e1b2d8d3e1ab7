use crate::background::BackgroundRunHandle;
use crate::graph::{WorkflowBuilder, WorkflowGraph};
use crate::runner::{Delivery, SuperstepRunner};
use crate::state::{RespondOutcome, RunStateMachine};
use flowcore::{
    event_queue, ExecutorId, ExecutorRef, ExecutorState, FailureDetails, FlowError, Message,
    PendingRequest, RequestId, RunState, Value, WorkflowError, WorkflowEvent, WorkflowSettings,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;

/// Configuration for a workflow instance
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on supersteps per run before it is failed
    pub max_supersteps: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_supersteps: 100,
        }
    }
}

impl From<&WorkflowSettings> for RuntimeConfig {
    fn from(settings: &WorkflowSettings) -> Self {
        Self {
            max_supersteps: settings.max_supersteps,
        }
    }
}

pub(crate) struct WorkflowInner {
    pub(crate) graph: WorkflowGraph,
    pub(crate) config: RuntimeConfig,
    states: HashMap<ExecutorId, Arc<RwLock<ExecutorState>>>,
    machine: Mutex<RunStateMachine>,
}

impl WorkflowInner {
    pub(crate) fn machine(&self) -> MutexGuard<'_, RunStateMachine> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state_of(&self, executor_id: &str) -> Arc<RwLock<ExecutorState>> {
        self.states.get(executor_id).cloned().unwrap_or_default()
    }
}

/// A runnable workflow instance
///
/// Cloning is cheap and yields another handle to the same instance: the
/// same run state, pending requests and executor state. At most one run is
/// in flight per instance.
#[derive(Clone)]
pub struct Workflow {
    pub(crate) inner: Arc<WorkflowInner>,
}

impl Workflow {
    pub(crate) fn new(graph: WorkflowGraph, config: RuntimeConfig) -> Self {
        let states = graph
            .executor_ids()
            .map(|id| (id.to_string(), Arc::new(RwLock::new(ExecutorState::default()))))
            .collect();
        Self {
            inner: Arc::new(WorkflowInner {
                graph,
                config,
                states,
                machine: Mutex::new(RunStateMachine::default()),
            }),
        }
    }

    pub fn builder(start: ExecutorRef) -> WorkflowBuilder {
        WorkflowBuilder::new(start)
    }

    pub fn name(&self) -> &str {
        self.inner.graph.name()
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.inner.graph
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn run_state(&self) -> RunState {
        self.inner.machine().state()
    }

    /// Requests still waiting for a response
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.inner.machine().pending().to_vec()
    }

    /// Run to convergence and return every event produced
    pub async fn run(&self, request: impl Into<RunRequest>) -> Result<WorkflowRunResult, FlowError> {
        let deliveries = self.begin(request.into())?;
        let (emitter, mut queue) = event_queue();
        let final_state = SuperstepRunner::new(self.inner.clone(), emitter)
            .run(deliveries)
            .await;
        Ok(WorkflowRunResult {
            events: queue.drain(),
            final_state,
        })
    }

    /// Start a run on a spawned task and return a handle to poll it
    ///
    /// Must be called from within a tokio runtime. Input validation and the
    /// concurrency guard are applied before anything is spawned.
    pub fn run_in_background(
        &self,
        request: impl Into<RunRequest>,
    ) -> Result<BackgroundRunHandle, FlowError> {
        let deliveries = self.begin(request.into())?;
        Ok(BackgroundRunHandle::spawn(self.clone(), deliveries))
    }

    /// Clear the local state of every executor
    ///
    /// Executor state is otherwise kept across runs. The instance lock is
    /// held throughout, so no run can start while state is being cleared.
    pub fn reset_executor_state(&self) -> Result<(), FlowError> {
        let machine = self.inner.machine();
        if machine.state() == RunState::Running {
            return Err(FlowError::ConcurrentRunRejected);
        }
        for (executor_id, state) in &self.inner.states {
            let mut state = state.try_write().map_err(|_| {
                FlowError::Execution(format!("State of '{}' is still in use", executor_id))
            })?;
            state.data.clear();
        }
        drop(machine);
        Ok(())
    }

    fn begin(&self, request: RunRequest) -> Result<Vec<Delivery>, FlowError> {
        let input = request.into_input()?;
        let mut machine = self.inner.machine();
        match input {
            RunInput::Message(message) => {
                if machine.state() == RunState::Running {
                    return Err(FlowError::ConcurrentRunRejected);
                }
                let graph = &self.inner.graph;
                let start = graph.start_executor_id();
                let accepted = graph
                    .capabilities(start)
                    .is_some_and(|caps| caps.can_handle(&message.kind));
                if !accepted {
                    return Err(WorkflowError::UnsupportedMessage {
                        executor: start.to_string(),
                        kind: message.kind,
                    }
                    .into());
                }
                machine.begin_fresh()?;
                Ok(vec![Delivery::Message {
                    target: start.to_string(),
                    message,
                }])
            }
            RunInput::Responses(responses) => machine.begin_with_responses(responses),
        }
    }

    pub(crate) fn respond(
        &self,
        responses: Vec<(RequestId, Message)>,
    ) -> Result<RespondOutcome, FlowError> {
        self.inner.machine().respond(responses)
    }
}

/// Input for starting a run: an initial message or responses, never both
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    message: Option<Message>,
    responses: Option<Vec<(RequestId, Message)>>,
}

pub(crate) enum RunInput {
    Message(Message),
    Responses(Vec<(RequestId, Message)>),
}

impl RunRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(message: Message) -> Self {
        Self::new().with_message(message)
    }

    pub fn responses<I, K>(responses: I) -> Self
    where
        I: IntoIterator<Item = (K, Message)>,
        K: Into<RequestId>,
    {
        Self::new().with_responses(responses)
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_responses<I, K>(mut self, responses: I) -> Self
    where
        I: IntoIterator<Item = (K, Message)>,
        K: Into<RequestId>,
    {
        self.responses = Some(
            responses
                .into_iter()
                .map(|(id, message)| (id.into(), message))
                .collect(),
        );
        self
    }

    pub(crate) fn into_input(self) -> Result<RunInput, FlowError> {
        let responses = self.responses.filter(|r| !r.is_empty());
        match (self.message, responses) {
            (Some(_), Some(_)) => Err(FlowError::ConflictingInput),
            (Some(message), None) => Ok(RunInput::Message(message)),
            (None, Some(responses)) => Ok(RunInput::Responses(responses)),
            (None, None) => Err(FlowError::MissingInput),
        }
    }
}

impl From<Message> for RunRequest {
    fn from(message: Message) -> Self {
        RunRequest::message(message)
    }
}

/// Result of a synchronous run
#[derive(Debug, Clone)]
pub struct WorkflowRunResult {
    events: Vec<WorkflowEvent>,
    final_state: RunState,
}

impl WorkflowRunResult {
    pub fn events(&self) -> &[WorkflowEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<WorkflowEvent> {
        self.events
    }

    pub fn final_state(&self) -> RunState {
        self.final_state
    }

    pub fn outputs(&self) -> Vec<&Value> {
        self.events.iter().filter_map(WorkflowEvent::as_output).collect()
    }

    pub fn request_info_events(&self) -> Vec<&WorkflowEvent> {
        self.events
            .iter()
            .filter(|e| matches!(e, WorkflowEvent::RequestInfo { .. }))
            .collect()
    }

    pub fn failure(&self) -> Option<&FailureDetails> {
        self.events.iter().find_map(|e| match e {
            WorkflowEvent::Failed { details, .. } => Some(details),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcore::ErrorKind;

    #[test]
    fn run_request_validation() {
        let err = RunRequest::new().into_input().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingInput);

        let err = RunRequest::responses(Vec::<(String, Message)>::new())
            .into_input()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingInput);

        let err = RunRequest::message(Message::new("text", "hi"))
            .with_responses([("r1", Message::new("answer", "yes"))])
            .into_input()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::ConflictingInput);

        assert!(matches!(
            RunRequest::from(Message::new("text", "hi")).into_input(),
            Ok(RunInput::Message(_))
        ));
    }
}
