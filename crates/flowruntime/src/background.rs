use crate::runner::{Delivery, SuperstepRunner};
use crate::runtime::Workflow;
use crate::state::RespondOutcome;
use flowcore::{event_queue, EventEmitter, EventQueue, FlowError, Message, RequestId, RunState, WorkflowEvent};
use tokio::task::JoinHandle;

/// Handle to a run executing on a spawned task
///
/// Events are queued as the scheduler produces them and taken with
/// [`poll`](Self::poll). Failures never surface as errors here; they arrive
/// as `failed` events followed by a `FAILED` status.
pub struct BackgroundRunHandle {
    workflow: Workflow,
    emitter: EventEmitter,
    queue: EventQueue,
    task: Option<JoinHandle<RunState>>,
}

impl BackgroundRunHandle {
    pub(crate) fn spawn(workflow: Workflow, deliveries: Vec<Delivery>) -> Self {
        let (emitter, queue) = event_queue();
        let mut handle = Self {
            workflow,
            emitter,
            queue,
            task: None,
        };
        handle.start(deliveries);
        handle
    }

    fn start(&mut self, deliveries: Vec<Delivery>) {
        let runner = SuperstepRunner::new(self.workflow.inner.clone(), self.emitter.clone());
        // A previous task may still be returning after its terminal status;
        // it emits nothing further and is left to finish on its own.
        self.task = Some(tokio::spawn(runner.run(deliveries)));
    }

    /// Drain every event queued so far, in production order
    pub fn poll(&mut self) -> Vec<WorkflowEvent> {
        self.queue.drain()
    }

    /// True once the task has stopped producing events
    pub fn is_idle(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Answer pending requests of this run
    ///
    /// Mid-run the responses join the next superstep. If the run had
    /// converged with pending requests a new task is started and the handle
    /// is no longer idle.
    pub fn respond<I, K>(&mut self, responses: I) -> Result<(), FlowError>
    where
        I: IntoIterator<Item = (K, Message)>,
        K: Into<RequestId>,
    {
        let responses = responses
            .into_iter()
            .map(|(id, message)| (id.into(), message))
            .collect();
        match self.workflow.respond(responses)? {
            RespondOutcome::Absorbed => {}
            RespondOutcome::Restart(deliveries) => {
                tracing::debug!("Restarting converged run with {} responses", deliveries.len());
                self.start(deliveries);
            }
        }
        Ok(())
    }

    /// Wait for the current task to finish and return its terminal state
    ///
    /// Queued events stay available to [`poll`](Self::poll). Dropping the
    /// returned future leaves the task attached to this handle.
    pub async fn wait(&mut self) -> Result<RunState, FlowError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(self.workflow.run_state());
        };
        let joined = task.await;
        // A completed JoinHandle must not be polled again
        self.task = None;
        joined.map_err(|e| FlowError::Execution(format!("Background run aborted: {}", e)))
    }
}
