//! Built-in demonstrations of the engine, run with `flow demo <name>`

use crate::print_event;
use anyhow::Result;
use flowcore::{ExecutorRef, RunState, WorkflowEvent};
use flownodes::{
    number, text, ApprovalExecutor, ApprovalResponse, DelayExecutor, IncrementExecutor,
    LogExecutor, ReverseTextExecutor, UpperCaseExecutor, ValidateTextExecutor, NUMBER,
};
use flowruntime::{BackgroundRunHandle, Workflow};
use std::sync::Arc;
use std::time::Duration;

fn ping_pong_workflow() -> Result<Workflow> {
    let ping: ExecutorRef = Arc::new(IncrementExecutor::new("ping", 1, Some(10)));
    let pong: ExecutorRef = Arc::new(IncrementExecutor::new("pong", 1, Some(10)));
    Ok(Workflow::builder(ping.clone())
        .with_name("ping-pong")
        .add_edge(&ping, &pong)
        .add_edge(&pong, &ping)
        .build()?)
}

/// Poll until the task is done, printing events; returns everything seen
async fn poll_to_idle(handle: &mut BackgroundRunHandle, interval: Duration) -> Vec<WorkflowEvent> {
    let mut seen = Vec::new();
    loop {
        let idle = handle.is_idle();
        for event in handle.poll() {
            print_event(&event);
            seen.push(event);
        }
        if idle {
            return seen;
        }
        tokio::time::sleep(interval).await;
    }
}

pub async fn polling() -> Result<()> {
    println!("=== Background run with polling ===");
    let workflow = ping_pong_workflow()?;
    let mut handle = workflow.run_in_background(number(0))?;

    let events = poll_to_idle(&mut handle, Duration::from_millis(10)).await;
    let outputs: Vec<_> = events.iter().filter_map(WorkflowEvent::as_output).collect();
    println!("Outputs: {:?}", outputs);
    println!("Final state: {}", workflow.run_state());
    Ok(())
}

pub async fn respond_while_running() -> Result<()> {
    println!("=== Responding while the run is still in flight ===");
    let dispatch: ExecutorRef = Arc::new(LogExecutor::new("dispatch", vec![NUMBER.to_string()], false));
    let hot_delay: ExecutorRef = Arc::new(DelayExecutor::new(
        "hot_delay",
        Duration::from_millis(20),
        vec![NUMBER.to_string()],
    ));
    let hot_count: ExecutorRef = Arc::new(IncrementExecutor::new("hot_count", 1, Some(20)));
    let gate: ExecutorRef = Arc::new(ApprovalExecutor::new(
        "gate",
        "Let the cold path through?",
        vec![NUMBER.to_string()],
    ));

    let workflow = Workflow::builder(dispatch.clone())
        .with_name("hot-and-cold")
        .add_fan_out_edges(&dispatch, &[hot_delay.clone(), gate])
        .add_edge(&hot_delay, &hot_count)
        .add_edge(&hot_count, &hot_delay)
        .build()?;

    let mut handle = workflow.run_in_background(number(0))?;
    let mut starts = 0;
    loop {
        let idle = handle.is_idle();
        let mut answers = Vec::new();
        for event in handle.poll() {
            print_event(&event);
            match &event {
                WorkflowEvent::Started { .. } => starts += 1,
                WorkflowEvent::RequestInfo { request_id, .. } => {
                    println!(
                        "  → approving {} while the run is {}",
                        request_id,
                        workflow.run_state()
                    );
                    answers.push((request_id.clone(), ApprovalResponse::approve().to_message()));
                }
                _ => {}
            }
        }
        if !answers.is_empty() {
            handle.respond(answers)?;
            continue;
        }
        if idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    println!("Runs started: {}", starts);
    println!("Final state: {}", workflow.run_state());
    Ok(())
}

pub async fn errors() -> Result<()> {
    println!("=== Failure handling and reuse ===");
    let validate: ExecutorRef = Arc::new(ValidateTextExecutor::new("validate", 1));
    let upper: ExecutorRef = Arc::new(UpperCaseExecutor::new("upper"));
    let reverse: ExecutorRef = Arc::new(ReverseTextExecutor::new("reverse"));
    let workflow = Workflow::builder(validate.clone())
        .with_name("validated-text")
        .add_edge(&validate, &upper)
        .add_edge(&upper, &reverse)
        .build()?;

    let mut handle = workflow.run_in_background(text("   "))?;
    let events = poll_to_idle(&mut handle, Duration::from_millis(5)).await;
    let failed = events
        .iter()
        .any(|e| matches!(e, WorkflowEvent::Failed { .. }));
    println!("Failure observed: {}, state {}", failed, workflow.run_state());

    match workflow.run_in_background(text("again")) {
        Ok(mut handle) => {
            poll_to_idle(&mut handle, Duration::from_millis(5)).await;
        }
        Err(e) => println!("Unexpected rejection: {}", e),
    }
    println!("Final state after reuse: {}", workflow.run_state());

    let mut handle = workflow.run_in_background(text("one"))?;
    if let Err(e) = workflow.run_in_background(text("two")) {
        println!("Second concurrent run rejected: {}", e);
    }
    handle.wait().await?;
    Ok(())
}

pub async fn ping_pong() -> Result<()> {
    println!("=== Synchronous ping-pong ===");
    let workflow = ping_pong_workflow()?;
    let result = workflow.run(number(0)).await?;
    for event in result.events() {
        print_event(event);
    }
    println!("Outputs: {:?}", result.outputs());
    if result.final_state() != RunState::Idle {
        println!("Unexpected final state: {}", result.final_state());
    }
    Ok(())
}
