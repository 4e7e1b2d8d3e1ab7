use super::WorkflowEvent;
use tokio::sync::mpsc;

/// Create a connected emitter/queue pair
///
/// The channel is unbounded so a slow or absent consumer never stalls the
/// scheduler.
pub fn event_queue() -> (EventEmitter, EventQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (EventEmitter { sender }, EventQueue { receiver })
}

/// Producer side of the event queue
#[derive(Debug, Clone)]
pub struct EventEmitter {
    sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl EventEmitter {
    pub fn emit(&self, event: WorkflowEvent) {
        tracing::trace!("Emitting event: {}", event.event_type());
        // Receiver may have been dropped; events are then discarded
        let _ = self.sender.send(event);
    }
}

/// Consumer side of the event queue
#[derive(Debug)]
pub struct EventQueue {
    receiver: mpsc::UnboundedReceiver<WorkflowEvent>,
}

impl EventQueue {
    /// Take every event queued right now, without waiting
    pub fn drain(&mut self) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunState;

    #[test]
    fn drain_preserves_order_and_empties() {
        let (emitter, mut queue) = event_queue();
        emitter.emit(WorkflowEvent::SuperstepStarted { superstep: 1 });
        emitter.emit(WorkflowEvent::SuperstepCompleted { superstep: 1 });
        emitter.emit(WorkflowEvent::status(RunState::Idle));

        let types: Vec<_> = queue.drain().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, ["superstep_started", "superstep_completed", "status"]);
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn drain_after_producer_dropped() {
        let (emitter, mut queue) = event_queue();
        emitter.emit(WorkflowEvent::SuperstepStarted { superstep: 3 });
        drop(emitter);

        assert_eq!(queue.drain().len(), 1);
        assert!(queue.drain().is_empty());
    }
}
