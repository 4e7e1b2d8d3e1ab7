// crates/flowcli/src/main.rs

mod demo;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flowcore::{
    ExecutorSpec, Message, Payload, RequestId, RunState, Value, WorkflowDefinition, WorkflowEvent,
};
use flownodes::ApprovalResponse;
use flowruntime::{ExecutorRegistry, RunRequest, Workflow};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to workflow JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Initial message body, as JSON or plain text
        #[arg(short, long)]
        input: String,

        /// Kind of the initial message
        #[arg(short, long, default_value = "text")]
        kind: String,

        /// Run on a background task and poll for events
        #[arg(short, long)]
        background: bool,

        /// Delay between polls in background mode
        #[arg(long, default_value_t = 50)]
        poll_interval_ms: u64,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a workflow file
    Validate {
        /// Path to workflow JSON file
        file: PathBuf,
    },

    /// List available executor types
    Executors,

    /// Create a new example workflow
    Init {
        /// Output file path
        #[arg(short, long, default_value = "workflow.json")]
        output: PathBuf,
    },

    /// Run a built-in demonstration
    Demo {
        #[arg(value_enum)]
        name: DemoName,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DemoName {
    /// Poll a background ping-pong run until it converges
    Polling,
    /// Answer a request while another branch keeps running
    Respond,
    /// Observe a failure and reuse the workflow afterwards
    Errors,
    /// Run ping-pong synchronously
    PingPong,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            kind,
            background,
            poll_interval_ms,
            verbose,
        } => {
            init_logging(verbose);
            let workflow = load(&file)?;
            let message = parse_message(&kind, &input);
            if background {
                run_background(&workflow, message, Duration::from_millis(poll_interval_ms)).await?;
            } else {
                run_sync(&workflow, message).await?;
            }
        }

        Commands::Validate { file } => {
            validate_workflow(&file)?;
        }

        Commands::Executors => {
            list_executors();
        }

        Commands::Init { output } => {
            create_example_workflow(&output)?;
        }

        Commands::Demo { name, verbose } => {
            init_logging(verbose);
            match name {
                DemoName::Polling => demo::polling().await?,
                DemoName::Respond => demo::respond_while_running().await?,
                DemoName::Errors => demo::errors().await?,
                DemoName::PingPong => demo::ping_pong().await?,
            }
        }
    }

    Ok(())
}

fn registry() -> ExecutorRegistry {
    let mut registry = ExecutorRegistry::new();
    flownodes::register_all(&mut registry);
    registry
}

fn load(file: &Path) -> Result<Workflow> {
    println!("🚀 Loading workflow from: {}", file.display());
    let workflow = flowruntime::load_workflow(file, &registry())
        .with_context(|| format!("failed to load {}", file.display()))?;
    println!("📋 Workflow: {}", workflow.name());
    println!("   Executors: {}", workflow.graph().executor_ids().count());
    println!("   Edges: {}", workflow.graph().edge_count());
    println!();
    Ok(workflow)
}

/// Plain text is accepted where JSON does not parse
fn parse_message(kind: &str, input: &str) -> Message {
    let json = serde_json::from_str(input)
        .unwrap_or_else(|_| serde_json::Value::String(input.to_string()));
    Message::new(kind, Value::from_json(json))
}

async fn run_sync(workflow: &Workflow, message: Message) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut request = RunRequest::message(message);

    loop {
        let result = workflow.run(request).await?;
        let mut answers = Vec::new();
        for event in result.events() {
            print_event(event);
            if let Some(answer) = answer_request(&mut stdin, event).await? {
                answers.push(answer);
            }
        }
        if result.final_state() != RunState::IdleWithPendingRequests || answers.is_empty() {
            break;
        }
        request = RunRequest::responses(answers);
    }

    print_summary(workflow);
    Ok(())
}

async fn run_background(workflow: &Workflow, message: Message, interval: Duration) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut handle = workflow.run_in_background(message)?;

    loop {
        // Checked before polling so the final poll sees every event
        let idle = handle.is_idle();
        let mut answers = Vec::new();
        for event in handle.poll() {
            print_event(&event);
            if let Some(answer) = answer_request(&mut stdin, &event).await? {
                answers.push(answer);
            }
        }
        if !answers.is_empty() {
            tracing::debug!("Responding to {} requests", answers.len());
            handle.respond(answers)?;
            continue;
        }
        if idle {
            break;
        }
        tokio::time::sleep(interval).await;
    }

    print_summary(workflow);
    Ok(())
}

/// Ask on stdin for the response to a `request_info` event
async fn answer_request(
    stdin: &mut Lines<BufReader<Stdin>>,
    event: &WorkflowEvent,
) -> Result<Option<(RequestId, Message)>> {
    let WorkflowEvent::RequestInfo {
        request_id,
        data,
        response_kind,
        ..
    } = event
    else {
        return Ok(None);
    };

    let approval = response_kind == ApprovalResponse::KIND;
    if approval {
        println!("❓ {} [y/n]", data.body.to_json());
    } else {
        println!("❓ Response of kind '{}' for {}:", response_kind, data.body.to_json());
    }

    let Some(line) = stdin.next_line().await? else {
        bail!("stdin closed while request {} was pending", request_id);
    };
    let line = line.trim();
    let response = if approval {
        let decision = match line.to_lowercase().as_str() {
            "y" | "yes" => ApprovalResponse::approve(),
            _ => ApprovalResponse::deny(format!("answered '{}'", line)),
        };
        decision.to_message()
    } else {
        parse_message(response_kind, line)
    };
    Ok(Some((request_id.clone(), response)))
}

pub(crate) fn print_event(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::Started { run_id, .. } => println!("▶️  Run {} started", run_id),
        WorkflowEvent::Status { state, .. } => println!("🔄 Status: {}", state),
        WorkflowEvent::SuperstepStarted { superstep } => println!("  ⏱️  Superstep {}", superstep),
        WorkflowEvent::ExecutorInvoked { executor_id, .. } => {
            println!("    ⚡ Invoking {}", executor_id)
        }
        WorkflowEvent::ExecutorCompleted { executor_id, .. } => {
            println!("    ✅ {} completed", executor_id)
        }
        WorkflowEvent::SuperstepCompleted { .. } => {}
        WorkflowEvent::Output { executor_id, data } => {
            println!("    📤 [{}] {}", executor_id, data.to_json())
        }
        WorkflowEvent::RequestInfo {
            request_id,
            source_executor_id,
            ..
        } => println!("    ✋ {} requested input ({})", source_executor_id, request_id),
        WorkflowEvent::Failed { details, .. } => match &details.executor_id {
            Some(id) => println!("💥 Executor {} failed: {}", id, details.message),
            None => println!("💥 Run failed: {}", details.message),
        },
    }
}

fn print_summary(workflow: &Workflow) {
    println!();
    println!("📊 Final state: {}", workflow.run_state());
    let pending = workflow.pending_requests();
    if !pending.is_empty() {
        println!("   Unanswered requests: {}", pending.len());
    }
}

fn validate_workflow(file: &Path) -> Result<()> {
    println!("🔍 Validating workflow: {}", file.display());

    let workflow = flowruntime::load_workflow(file, &registry())?;
    let graph = workflow.graph();

    println!("✅ Workflow is valid:");
    println!("   Name: {}", workflow.name());
    println!("   Start: {}", graph.start_executor_id());
    println!("   Executors: {}", graph.executor_ids().count());
    println!("   Edges: {}", graph.edge_count());
    println!("   Max supersteps: {}", workflow.config().max_supersteps);

    Ok(())
}

fn list_executors() {
    println!("📦 Available Executor Types:");
    println!();

    let registry = registry();
    for executor_type in registry.list_executor_types() {
        if let Some(metadata) = registry.get_metadata(&executor_type) {
            println!("  • {} ({})", executor_type, metadata.category);
            println!("    {}", metadata.description);
            println!("    accepts: {}", metadata.accepts.join(", "));
            if !metadata.emits.is_empty() {
                println!("    emits: {}", metadata.emits.join(", "));
            }
        } else {
            println!("  • {}", executor_type);
        }
    }
}

fn create_example_workflow(output: &Path) -> Result<()> {
    let mut definition = WorkflowDefinition::new("Example approval workflow", "validate");
    definition.description =
        Some("Validates text, asks for approval, then upper-cases and reverses it".to_string());

    let validate = definition.add_executor(ExecutorSpec::new("validate", "text.validate"));
    let approve = definition.add_executor(
        ExecutorSpec::new("approve", "human.approval").with_config("prompt", "Publish this text?"),
    );
    let upper = definition.add_executor(ExecutorSpec::new("upper", "text.upper_case"));
    let reverse = definition.add_executor(ExecutorSpec::new("reverse", "text.reverse"));

    definition.connect(validate, approve.clone());
    definition.connect(approve, upper.clone());
    definition.connect(upper, reverse);

    let json = serde_json::to_string_pretty(&definition)?;
    std::fs::write(output, json)?;

    println!("✨ Created example workflow: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  flow run --file {} --input 'hello world'", output.display());

    Ok(())
}
