//! Agent scaler binary.
//!
//! Runs under the AWS Lambda runtime by default. `agent-scaler run` executes
//! a single invocation locally with an explicit duration.

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fleet_cloud::{deadline_from_epoch_millis, deadline_in, init_tracing};
use fleet_events::InvocationResponse;
use lambda_runtime::{service_fn, LambdaEvent};
use tracing::info;

use fleet_agent_scaler::handler;

#[derive(Debug, Parser)]
#[command(name = "agent-scaler", about = "Scale the agent fleet up to CI job demand")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve invocations from the Lambda runtime API (default).
    Lambda,

    /// Run one invocation locally.
    Run {
        /// Seconds until the invocation deadline.
        #[arg(long, default_value_t = 60)]
        duration: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Lambda) {
        Command::Lambda => {
            info!("Starting agent scaler on the Lambda runtime");
            lambda_runtime::run(service_fn(handle_event))
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        Command::Run { duration } => {
            let response = handler::invoke(deadline_in(Duration::from_secs(duration))).await;
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
    let deadline = deadline_from_epoch_millis(event.context.deadline);
    Ok(handler::invoke(deadline).await)
}
