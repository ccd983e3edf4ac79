//! Agent starter binary.
//!
//! Runs under the AWS Lambda runtime by default. `agent-starter run --event`
//! handles a lifecycle event read from a JSON file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_cloud::init_tracing;
use fleet_events::InvocationResponse;
use lambda_runtime::{service_fn, LambdaEvent};
use tracing::info;

use fleet_agent_starter::handler;

#[derive(Debug, Parser)]
#[command(
    name = "agent-starter",
    about = "Start the CI agent on new instances and resolve their lifecycle hook"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve invocations from the Lambda runtime API (default).
    Lambda,

    /// Handle one event locally.
    Run {
        /// Path to a JSON lifecycle event.
        #[arg(long)]
        event: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Lambda) {
        Command::Lambda => {
            info!("Starting agent starter on the Lambda runtime");
            lambda_runtime::run(service_fn(handle_event))
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        Command::Run { event } => {
            let raw = tokio::fs::read_to_string(&event)
                .await
                .with_context(|| format!("failed to read event file {}", event.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("event file {} is not valid JSON", event.display()))?;

            let response = handler::invoke(payload).await;
            println!("{}", serde_json::to_string(&response)?);
            if !response.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn handle_event(
    event: LambdaEvent<serde_json::Value>,
) -> Result<InvocationResponse, lambda_runtime::Error> {
    Ok(handler::invoke(event.payload).await)
}
