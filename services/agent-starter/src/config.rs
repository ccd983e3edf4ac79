//! Configuration for the lifecycle starter.

use std::time::Duration;

use fleet_cloud::ClientTimeouts;
use fleet_reconcile::{
    PollBudget, DEFAULT_COMMAND_POLL_ATTEMPTS, DEFAULT_COMMAND_POLL_INTERVAL,
    DEFAULT_INSTANCE_POLL_ATTEMPTS, DEFAULT_INSTANCE_POLL_INTERVAL,
};

use crate::command::StartCommand;
use crate::error::StarterError;

/// Install script baked into the agent image.
pub const DEFAULT_START_SCRIPT: &str = "/opt/semaphore/install-agent.sh";

/// Default remote execution timeout of the start command.
pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(20);

/// Lifecycle starter configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The command run on each new instance.
    pub start_command: StartCommand,

    /// Budget for waiting on the instance to come online.
    pub instance_poll: PollBudget,

    /// Budget for waiting on the start command to finish.
    pub command_poll: PollBudget,

    pub timeouts: ClientTimeouts,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, StarterError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StarterError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let config_ref = get("AGENT_CONFIG_PARAMETER_NAME")
            .ok_or(StarterError::MissingConfig("AGENT_CONFIG_PARAMETER_NAME"))?;

        let script = get("AGENT_START_SCRIPT").unwrap_or_else(|| DEFAULT_START_SCRIPT.to_string());
        let start_timeout = seconds(
            "AGENT_START_TIMEOUT_SECS",
            get("AGENT_START_TIMEOUT_SECS"),
            DEFAULT_START_TIMEOUT,
        )?;

        let instance_poll = PollBudget::new(
            number(
                "STARTER_INSTANCE_POLL_ATTEMPTS",
                get("STARTER_INSTANCE_POLL_ATTEMPTS"),
                DEFAULT_INSTANCE_POLL_ATTEMPTS,
            )?,
            seconds(
                "STARTER_INSTANCE_POLL_INTERVAL_SECS",
                get("STARTER_INSTANCE_POLL_INTERVAL_SECS"),
                DEFAULT_INSTANCE_POLL_INTERVAL,
            )?,
        )?;

        let command_poll = PollBudget::new(
            number(
                "STARTER_COMMAND_POLL_ATTEMPTS",
                get("STARTER_COMMAND_POLL_ATTEMPTS"),
                DEFAULT_COMMAND_POLL_ATTEMPTS,
            )?,
            seconds(
                "STARTER_COMMAND_POLL_INTERVAL_SECS",
                get("STARTER_COMMAND_POLL_INTERVAL_SECS"),
                DEFAULT_COMMAND_POLL_INTERVAL,
            )?,
        )?;

        let timeouts = ClientTimeouts::uniform(seconds(
            "STARTER_HTTP_TIMEOUT_SECS",
            get("STARTER_HTTP_TIMEOUT_SECS"),
            ClientTimeouts::default().response,
        )?);

        Ok(Self {
            start_command: StartCommand {
                script,
                config_ref,
                execution_timeout: start_timeout,
            },
            instance_poll,
            command_poll,
            timeouts,
        })
    }
}

fn number(name: &'static str, value: Option<String>, default: u32) -> Result<u32, StarterError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: std::num::ParseIntError| StarterError::InvalidConfig {
                name,
                reason: format!("'{}': {}", raw, e),
            }),
    }
}

fn seconds(
    name: &'static str,
    value: Option<String>,
    default: Duration,
) -> Result<Duration, StarterError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|e: std::num::ParseIntError| StarterError::InvalidConfig {
                name,
                reason: format!("'{}': {}", raw, e),
            }),
    }
}
