mod common;

use common::*;
use flowcore::{ErrorKind, RunState, Value, WorkflowEvent};
use flowruntime::{BackgroundRunHandle, RunRequest, Workflow};
use std::time::Duration;

async fn drain_until_idle(handle: &mut BackgroundRunHandle) -> Vec<WorkflowEvent> {
    let drain = async {
        let mut events = Vec::new();
        while !handle.is_idle() {
            events.extend(handle.poll());
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        events.extend(handle.poll());
        events
    };
    tokio::time::timeout(Duration::from_secs(10), drain)
        .await
        .expect("background run did not become idle")
}

fn ping_pong() -> Workflow {
    let ping = incrementer("ping", 10);
    let pong = incrementer("pong", 10);
    Workflow::builder(ping.clone())
        .with_name("ping-pong")
        .add_edge(&ping, &pong)
        .add_edge(&pong, &ping)
        .build()
        .unwrap()
}

fn approval_gate() -> Workflow {
    Workflow::builder(gate("gate")).build().unwrap()
}

fn hot_and_cold_paths() -> Workflow {
    let dispatch = relay("dispatch", &[NUMBER]);
    let slow = slow_loop("slow", 30, Duration::from_millis(10));
    let approval = gate("approval");
    Workflow::builder(dispatch.clone())
        .add_fan_out_edges(&dispatch, &[slow.clone(), approval])
        .add_edge(&slow, &slow)
        .build()
        .unwrap()
}

#[tokio::test]
async fn ping_pong_yields_single_output() {
    init_tracing();
    let workflow = ping_pong();
    let mut handle = workflow.run_in_background(number(0)).unwrap();
    let events = drain_until_idle(&mut handle).await;

    assert_eq!(outputs(&events), vec![Value::from(10)]);
    assert_eq!(workflow.run_state(), RunState::Idle);
}

#[tokio::test]
async fn status_events_bracket_the_run() {
    let workflow = ping_pong();
    let mut handle = workflow.run_in_background(number(0)).unwrap();
    let events = drain_until_idle(&mut handle).await;

    assert_eq!(event_types(&events)[0], "started");
    assert_eq!(statuses(&events), vec![RunState::Running, RunState::Idle]);
    assert_eq!(events.last().and_then(WorkflowEvent::as_status), Some(RunState::Idle));
}

#[tokio::test]
async fn poll_is_empty_once_drained() {
    let workflow = ping_pong();
    let mut handle = workflow.run_in_background(number(0)).unwrap();
    drain_until_idle(&mut handle).await;

    assert!(handle.poll().is_empty());
    assert!(handle.poll().is_empty());
}

#[tokio::test]
async fn executor_failure_arrives_as_event() {
    init_tracing();
    let workflow = Workflow::builder(failing("boom")).build().unwrap();
    let mut handle = workflow.run_in_background(number(1)).unwrap();
    let events = drain_until_idle(&mut handle).await;

    let failures: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::Failed { details, .. } => Some(details),
            _ => None,
        })
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].message.contains("Intentional failure"));
    assert_eq!(failures[0].kind, ErrorKind::ExecutorFailure);
    assert_eq!(failures[0].executor_id.as_deref(), Some("boom"));
    assert!(handle.is_idle());
    assert_eq!(statuses(&events).last(), Some(&RunState::Failed));
}

#[tokio::test]
async fn second_run_is_rejected_while_running() {
    let workflow = hot_and_cold_paths();
    let mut handle = workflow.run_in_background(number(1)).unwrap();

    let err = workflow.run(number(1)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConcurrentRunRejected);
    assert_eq!(
        err.to_string(),
        "Workflow is already running. Concurrent executions are not allowed."
    );

    let err = workflow.run_in_background(number(1)).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::ConcurrentRunRejected);

    let events = drain_until_idle(&mut handle).await;
    assert_eq!(statuses(&events).last(), Some(&RunState::IdleWithPendingRequests));
}

#[tokio::test]
async fn instance_is_reusable_after_completion_and_failure() {
    let workflow = ping_pong();
    for _ in 0..2 {
        let mut handle = workflow.run_in_background(number(0)).unwrap();
        let events = drain_until_idle(&mut handle).await;
        assert_eq!(outputs(&events), vec![Value::from(10)]);
    }

    let workflow = Workflow::builder(failing_on_negative("picky")).build().unwrap();
    let mut handle = workflow.run_in_background(number(-1)).unwrap();
    drain_until_idle(&mut handle).await;
    assert_eq!(workflow.run_state(), RunState::Failed);

    let mut handle = workflow.run_in_background(number(3)).unwrap();
    let events = drain_until_idle(&mut handle).await;
    assert_eq!(outputs(&events), vec![Value::from(3)]);
    assert_eq!(workflow.run_state(), RunState::Idle);
}

#[tokio::test]
async fn run_input_is_validated() {
    let workflow = ping_pong();

    let err = workflow.run_in_background(RunRequest::new()).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::MissingInput);

    let both = RunRequest::message(number(0)).with_responses([("r1", approval(true))]);
    let err = workflow.run_in_background(both).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::ConflictingInput);

    // Rejected input leaves the guard untouched
    assert_eq!(workflow.run_state(), RunState::Idle);
}

#[tokio::test]
async fn respond_after_convergence_restarts_the_run() {
    init_tracing();
    let workflow = approval_gate();
    let mut handle = workflow.run_in_background(number(42)).unwrap();
    let events = drain_until_idle(&mut handle).await;

    assert_eq!(statuses(&events).last(), Some(&RunState::IdleWithPendingRequests));
    let ids = request_ids(&events);
    assert_eq!(ids.len(), 1);
    assert!(handle.is_idle());

    handle.respond([(ids[0].clone(), approval(true))]).unwrap();
    assert!(!handle.is_idle());

    let events = drain_until_idle(&mut handle).await;
    assert_eq!(outputs(&events), vec![Value::from(42)]);
    assert_eq!(statuses(&events).last(), Some(&RunState::Idle));
    assert!(workflow.pending_requests().is_empty());
}

#[tokio::test]
async fn respond_while_running_joins_the_run() {
    init_tracing();
    let workflow = hot_and_cold_paths();
    let mut handle = workflow.run_in_background(number(7)).unwrap();

    let mut events = Vec::new();
    let request_id = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            events.extend(handle.poll());
            if let Some(id) = request_ids(&events).into_iter().next() {
                break id;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("approval request never arrived");

    assert!(!handle.is_idle());
    handle.respond([(request_id, approval(true))]).unwrap();
    assert!(!handle.is_idle());

    events.extend(drain_until_idle(&mut handle).await);

    let produced = outputs(&events);
    assert!(produced.contains(&Value::from(7)));
    assert!(produced.contains(&Value::from(700)));
    // The response was absorbed: one run, one terminal status
    assert_eq!(event_types(&events).iter().filter(|t| **t == "started").count(), 1);
    assert_eq!(statuses(&events), vec![RunState::Running, RunState::Idle]);
}

#[tokio::test]
async fn unknown_request_id_is_rejected() {
    let workflow = approval_gate();
    let mut handle = workflow.run_in_background(number(1)).unwrap();
    drain_until_idle(&mut handle).await;

    let err = handle.respond([("no-such-request", approval(true))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequestId);
    assert_eq!(
        err.to_string(),
        "No pending request found for request id: no-such-request"
    );
    assert!(handle.is_idle());
    assert_eq!(workflow.pending_requests().len(), 1);
}

#[tokio::test]
async fn sequential_requests_can_be_denied() {
    let workflow = approval_gate();

    let mut handle = workflow.run_in_background(number(5)).unwrap();
    let events = drain_until_idle(&mut handle).await;
    let id = request_ids(&events).remove(0);
    handle.respond([(id.clone(), approval(false))]).unwrap();
    let events = drain_until_idle(&mut handle).await;
    assert_eq!(outputs(&events), vec![Value::from(-1)]);

    // The answered request is gone
    let err = handle.respond([(id, approval(true))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequestId);

    let mut handle = workflow.run_in_background(number(6)).unwrap();
    let events = drain_until_idle(&mut handle).await;
    let id = request_ids(&events).remove(0);
    handle.respond([(id, approval(true))]).unwrap();
    let events = drain_until_idle(&mut handle).await;
    assert_eq!(outputs(&events), vec![Value::from(6)]);
}

#[tokio::test]
async fn wait_returns_terminal_state() {
    let workflow = ping_pong();
    let mut handle = workflow.run_in_background(number(0)).unwrap();
    assert_eq!(handle.wait().await.unwrap(), RunState::Idle);
    assert!(handle.is_idle());
    assert_eq!(outputs(&handle.poll()), vec![Value::from(10)]);
}

#[tokio::test]
async fn cancelled_wait_keeps_the_task() {
    let workflow = Workflow::builder(slow_loop("slow", 1, Duration::from_millis(300)))
        .build()
        .unwrap();
    let mut handle = workflow.run_in_background(number(1)).unwrap();

    let timed_out = tokio::time::timeout(Duration::from_millis(20), handle.wait()).await;
    assert!(timed_out.is_err());
    assert_eq!(workflow.run_state(), RunState::Running);
    assert!(!handle.is_idle());

    assert_eq!(handle.wait().await.unwrap(), RunState::Idle);
    assert!(handle.is_idle());
    assert_eq!(handle.wait().await.unwrap(), RunState::Idle);
    assert_eq!(outputs(&handle.poll()), vec![Value::from(100)]);
}

#[tokio::test]
async fn separate_mid_run_responses_share_a_superstep() {
    init_tracing();
    let dispatch = relay("dispatch", &[NUMBER]);
    let slow = slow_loop("slow", 30, Duration::from_millis(10));
    let workflow = Workflow::builder(dispatch.clone())
        .add_fan_out_edges(&dispatch, &[slow.clone(), gate("a"), gate("b")])
        .add_edge(&slow, &slow)
        .build()
        .unwrap();
    let mut handle = workflow.run_in_background(number(7)).unwrap();

    let mut events = Vec::new();
    let ids = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            events.extend(handle.poll());
            let ids = request_ids(&events);
            if ids.len() == 2 {
                break ids;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("approval requests never arrived");

    assert_eq!(workflow.run_state(), RunState::Running);
    for id in ids {
        handle.respond([(id, approval(true))]).unwrap();
    }
    events.extend(drain_until_idle(&mut handle).await);

    let invocations = |gate_id: &str| {
        events
            .iter()
            .filter_map(|e| match e {
                WorkflowEvent::ExecutorInvoked {
                    executor_id,
                    superstep,
                } if executor_id == gate_id => Some(*superstep),
                _ => None,
            })
            .collect::<Vec<_>>()
    };
    let a = invocations("a");
    let b = invocations("b");
    assert_eq!(a.len(), 2);
    assert_eq!(b.len(), 2);
    assert_eq!(a[0], b[0]);
    assert_eq!(a[1], b[1]);
    assert!(a[1] > a[0]);

    assert_eq!(
        outputs(&events).iter().filter(|v| **v == Value::from(7)).count(),
        2
    );
    assert_eq!(statuses(&events), vec![RunState::Running, RunState::Idle]);
}
