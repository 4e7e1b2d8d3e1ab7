use crate::runtime::WorkflowInner;
use chrono::Utc;
use flowcore::{
    Effect, ErrorKind, EventEmitter, ExecutorError, ExecutorId, FailureDetails, Message,
    OutgoingMessage, RequestId, RunId, RunState, WorkflowContext, WorkflowEvent,
};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// One unit of work queued for a superstep
#[derive(Debug, Clone)]
pub(crate) enum Delivery {
    Message {
        target: ExecutorId,
        message: Message,
    },
    Response {
        target: ExecutorId,
        request_id: RequestId,
        request: Message,
        response: Message,
    },
}

impl Delivery {
    pub(crate) fn target(&self) -> &str {
        match self {
            Delivery::Message { target, .. } | Delivery::Response { target, .. } => target,
        }
    }
}

/// Drives supersteps over a workflow until it converges or fails
///
/// Handlers run one at a time, in queue order. A failing handler does not
/// stop its siblings; the run fails once the superstep is over.
pub(crate) struct SuperstepRunner {
    inner: Arc<WorkflowInner>,
    events: EventEmitter,
    run_id: RunId,
    finished: bool,
}

impl SuperstepRunner {
    pub(crate) fn new(inner: Arc<WorkflowInner>, events: EventEmitter) -> Self {
        Self {
            inner,
            events,
            run_id: RunId::new_v4(),
            finished: false,
        }
    }

    /// Execute until convergence and return the terminal state
    pub(crate) async fn run(mut self, initial: Vec<Delivery>) -> RunState {
        let start_time = Instant::now();
        let max_supersteps = self.inner.config.max_supersteps;

        self.events.emit(WorkflowEvent::Started {
            run_id: self.run_id,
            timestamp: Utc::now(),
        });
        self.events.emit(WorkflowEvent::status(RunState::Running));

        tracing::info!(
            "Starting run {} of workflow '{}' with {} deliveries",
            self.run_id,
            self.inner.graph.name(),
            initial.len()
        );

        let mut current = initial;
        let mut superstep = 0;

        let final_state = loop {
            if superstep >= max_supersteps {
                break self.fail(FailureDetails {
                    kind: ErrorKind::MaxSuperstepsExceeded,
                    message: format!(
                        "Workflow did not converge within {} supersteps",
                        max_supersteps
                    ),
                    executor_id: None,
                });
            }
            superstep += 1;

            let (mut next, failure) = self.execute_superstep(superstep, current).await;
            if let Some(details) = failure {
                break self.fail(details);
            }
            match self.converge(&mut next) {
                Some(state) => break state,
                None => current = next,
            }
        };

        tracing::info!(
            "Run {} finished as {} after {} supersteps in {}ms",
            self.run_id,
            final_state,
            superstep,
            start_time.elapsed().as_millis()
        );

        final_state
    }

    async fn execute_superstep(
        &self,
        superstep: usize,
        current: Vec<Delivery>,
    ) -> (Vec<Delivery>, Option<FailureDetails>) {
        self.events
            .emit(WorkflowEvent::SuperstepStarted { superstep });
        tracing::debug!(
            "Superstep {} started with {} deliveries",
            superstep,
            current.len()
        );

        let mut next = Vec::new();
        let mut failure = None;

        for delivery in current {
            let executor_id = delivery.target().to_string();
            self.events.emit(WorkflowEvent::ExecutorInvoked {
                executor_id: executor_id.clone(),
                superstep,
            });

            let (outbox, effects, result) = self.dispatch(superstep, delivery).await;
            self.publish_effects(&executor_id, effects);

            match result {
                Ok(()) => self.route(&executor_id, outbox, &mut next),
                Err(e) => {
                    tracing::error!("Executor {} failed: {}", executor_id, e);
                    // The first failure of the superstep is the one reported
                    if failure.is_none() {
                        failure = Some(FailureDetails {
                            kind: ErrorKind::ExecutorFailure,
                            message: e.to_string(),
                            executor_id: Some(executor_id.clone()),
                        });
                    }
                }
            }

            self.events.emit(WorkflowEvent::ExecutorCompleted {
                executor_id,
                superstep,
            });
        }

        self.events
            .emit(WorkflowEvent::SuperstepCompleted { superstep });
        (next, failure)
    }

    /// Invoke the handler a delivery is addressed to
    async fn dispatch(
        &self,
        superstep: usize,
        delivery: Delivery,
    ) -> (Vec<OutgoingMessage>, Vec<Effect>, Result<(), ExecutorError>) {
        let target = delivery.target().to_string();
        let (executor, capabilities) = match (
            self.inner.graph.executor(&target),
            self.inner.graph.capabilities(&target),
        ) {
            (Some(executor), Some(capabilities)) => (executor.clone(), capabilities),
            _ => {
                let err = ExecutorError::ExecutionFailed(format!("executor {} not found", target));
                return (Vec::new(), Vec::new(), Err(err));
            }
        };

        let mut ctx = WorkflowContext::new(target.clone(), superstep, self.inner.state_of(&target));
        let start = Instant::now();

        let result = match delivery {
            Delivery::Message { message, .. } => {
                if capabilities.can_handle(&message.kind) {
                    let invocation = executor.handle(message, &mut ctx);
                    catch_panics(AssertUnwindSafe(invocation).catch_unwind().await)
                } else {
                    Err(ExecutorError::UnsupportedMessage {
                        executor: target.clone(),
                        kind: message.kind,
                    })
                }
            }
            Delivery::Response {
                request_id,
                request,
                response,
                ..
            } => {
                if capabilities.can_handle_response(&request.kind, &response.kind) {
                    ctx = ctx.for_response(request_id);
                    let invocation = executor.handle_response(request, response, &mut ctx);
                    catch_panics(AssertUnwindSafe(invocation).catch_unwind().await)
                } else {
                    Err(ExecutorError::NoResponseHandler {
                        executor: target.clone(),
                        request_kind: request.kind,
                        response_kind: response.kind,
                    })
                }
            }
        };

        tracing::debug!(
            "Executor {} handled delivery in {}ms",
            target,
            start.elapsed().as_millis()
        );

        let (outbox, effects) = ctx.into_parts();
        (outbox, effects, result)
    }

    /// Emit outputs and register requests in the order the handler made them
    fn publish_effects(&self, executor_id: &str, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Output(data) => {
                    self.events.emit(WorkflowEvent::Output {
                        executor_id: executor_id.to_string(),
                        data,
                    });
                }
                Effect::Request(request) => {
                    tracing::info!(
                        "Executor {} requested external input ({})",
                        executor_id,
                        request.request_id
                    );
                    let event = WorkflowEvent::RequestInfo {
                        request_id: request.request_id.clone(),
                        source_executor_id: request.source_executor_id.clone(),
                        data: request.request.clone(),
                        response_kind: request.response_kind.clone(),
                    };
                    // Registered before the caller can learn the id
                    self.inner.machine().register_request(request);
                    self.events.emit(event);
                }
            }
        }
    }

    /// Queue sent messages for the next superstep
    fn route(&self, source: &str, outbox: Vec<OutgoingMessage>, next: &mut Vec<Delivery>) {
        for outgoing in outbox {
            let targets = self.inner.graph.route(
                source,
                &outgoing.message.kind,
                outgoing.target.as_deref(),
            );
            if targets.is_empty() {
                tracing::warn!(
                    "Message of kind '{}' from {} has no receiver and was dropped",
                    outgoing.message.kind,
                    source
                );
                continue;
            }
            for target in targets {
                next.push(Delivery::Message {
                    target,
                    message: outgoing.message.clone(),
                });
            }
        }
    }

    fn converge(&mut self, next: &mut Vec<Delivery>) -> Option<RunState> {
        let mut machine = self.inner.machine();
        let state = machine.converge(next)?;
        // Emitted under the lock so a concurrent respond sees the status first
        self.events.emit(WorkflowEvent::status(state));
        self.finished = true;
        Some(state)
    }

    fn fail(&mut self, details: FailureDetails) -> RunState {
        tracing::error!("Run {} failed: {}", self.run_id, details.message);
        let mut machine = self.inner.machine();
        machine.fail();
        self.events.emit(WorkflowEvent::failed(details));
        self.events.emit(WorkflowEvent::status(RunState::Failed));
        self.finished = true;
        RunState::Failed
    }
}

impl Drop for SuperstepRunner {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Run {} dropped before convergence", self.run_id);
            self.inner.machine().abandon();
        }
    }
}

fn catch_panics(
    outcome: Result<Result<(), ExecutorError>, Box<dyn Any + Send>>,
) -> Result<(), ExecutorError> {
    outcome.unwrap_or_else(|panic| {
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Err(ExecutorError::Panicked(message))
    })
}
