//! Remote command dispatch and status.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StarterError;

/// SSM document that runs a shell script.
pub const RUN_SHELL_SCRIPT_DOCUMENT: &str = "AWS-RunShellScript";

/// Status of a dispatched command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Pending,
    InProgress,
    Delayed,
    Cancelling,
    Success,
    Cancelled,
    Failed,
    TimedOut,
    Unknown(String),
}

impl CommandStatus {
    /// Map an SSM command status value.
    pub fn parse(status: &str) -> Self {
        match status {
            "Pending" => CommandStatus::Pending,
            "InProgress" => CommandStatus::InProgress,
            "Delayed" => CommandStatus::Delayed,
            "Cancelling" => CommandStatus::Cancelling,
            "Success" => CommandStatus::Success,
            "Cancelled" => CommandStatus::Cancelled,
            "Failed" => CommandStatus::Failed,
            "TimedOut" => CommandStatus::TimedOut,
            other => CommandStatus::Unknown(other.to_string()),
        }
    }

    /// Whether the command has finished and will not change further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Success
                | CommandStatus::Cancelled
                | CommandStatus::Failed
                | CommandStatus::TimedOut
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            CommandStatus::Pending => "Pending",
            CommandStatus::InProgress => "InProgress",
            CommandStatus::Delayed => "Delayed",
            CommandStatus::Cancelling => "Cancelling",
            CommandStatus::Success => "Success",
            CommandStatus::Cancelled => "Cancelled",
            CommandStatus::Failed => "Failed",
            CommandStatus::TimedOut => "TimedOut",
            CommandStatus::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A dispatched command and the last status seen for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandExecution {
    pub command_id: String,
    pub status: CommandStatus,
}

/// The agent install/start invocation run on new instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCommand {
    /// Script path on the instance image.
    pub script: String,
    /// Configuration bundle reference passed as the only argument.
    pub config_ref: String,
    /// Remote execution timeout.
    pub execution_timeout: Duration,
}

impl StartCommand {
    pub fn shell_command(&self) -> String {
        format!("{} {}", self.script, self.config_ref)
    }
}

/// Remote command interface.
#[async_trait]
pub trait CommandApi: Send + Sync {
    /// Send the start command to one instance and return its command ID.
    async fn send_start_command(
        &self,
        instance_id: &str,
        command: &StartCommand,
    ) -> Result<String, StarterError>;

    async fn command_status(&self, command_id: &str) -> Result<CommandStatus, StarterError>;
}

/// Runs commands through SSM Run Command.
pub struct SsmCommands {
    client: aws_sdk_ssm::Client,
}

impl SsmCommands {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CommandApi for SsmCommands {
    async fn send_start_command(
        &self,
        instance_id: &str,
        command: &StartCommand,
    ) -> Result<String, StarterError> {
        let output = self
            .client
            .send_command()
            .instance_ids(instance_id)
            .document_name(RUN_SHELL_SCRIPT_DOCUMENT)
            .parameters("commands", vec![command.shell_command()])
            .parameters(
                "executionTimeout",
                vec![command.execution_timeout.as_secs().to_string()],
            )
            .send()
            .await
            .map_err(|e| StarterError::Command(DisplayErrorContext(&e).to_string()))?;

        let command_id = output
            .command()
            .and_then(|c| c.command_id())
            .filter(|id| !id.is_empty())
            .ok_or(StarterError::MissingCommandId)?
            .to_string();

        info!(instance_id = %instance_id, command_id = %command_id, "Sent start command");
        Ok(command_id)
    }

    async fn command_status(&self, command_id: &str) -> Result<CommandStatus, StarterError> {
        let output = self
            .client
            .list_commands()
            .command_id(command_id)
            .send()
            .await
            .map_err(|e| StarterError::Command(DisplayErrorContext(&e).to_string()))?;

        // Freshly sent commands can be missing from the listing for a moment.
        let status = output
            .commands()
            .first()
            .and_then(|c| c.status())
            .map(|s| CommandStatus::parse(s.as_str()))
            .unwrap_or(CommandStatus::Pending);

        debug!(command_id = %command_id, status = %status, "Listed command");
        Ok(status)
    }
}

/// Scripted command API for tests and local runs.
pub struct MockCommands {
    statuses: Mutex<VecDeque<CommandStatus>>,
    last: Mutex<CommandStatus>,
    dispatched: Mutex<Vec<(String, String)>>,
    status_calls: Mutex<u32>,
    fail_dispatch: bool,
}

impl MockCommands {
    /// Statuses returned by successive `command_status` calls; the last one
    /// repeats.
    pub fn scripted(statuses: Vec<CommandStatus>) -> Self {
        Self {
            statuses: Mutex::new(statuses.into()),
            last: Mutex::new(CommandStatus::Pending),
            dispatched: Mutex::new(Vec::new()),
            status_calls: Mutex::new(0),
            fail_dispatch: false,
        }
    }

    /// In progress until the given 1-based attempt, which reports `status`.
    pub fn finishes_on_attempt(attempt: u32, status: CommandStatus) -> Self {
        let mut statuses: Vec<_> = (1..attempt).map(|_| CommandStatus::InProgress).collect();
        statuses.push(status);
        Self::scripted(statuses)
    }

    /// A command API that rejects every dispatch.
    pub fn failing_dispatch() -> Self {
        Self {
            fail_dispatch: true,
            ..Self::scripted(Vec::new())
        }
    }

    /// Every `(instance_id, shell command)` dispatched.
    pub async fn dispatched(&self) -> Vec<(String, String)> {
        self.dispatched.lock().await.clone()
    }

    pub async fn status_calls(&self) -> u32 {
        *self.status_calls.lock().await
    }
}

#[async_trait]
impl CommandApi for MockCommands {
    async fn send_start_command(
        &self,
        instance_id: &str,
        command: &StartCommand,
    ) -> Result<String, StarterError> {
        if self.fail_dispatch {
            return Err(StarterError::Command("mock commands configured to fail".to_string()));
        }

        let mut dispatched = self.dispatched.lock().await;
        dispatched.push((instance_id.to_string(), command.shell_command()));
        Ok(format!("cmd-{}", dispatched.len()))
    }

    async fn command_status(&self, _command_id: &str) -> Result<CommandStatus, StarterError> {
        *self.status_calls.lock().await += 1;

        let mut last = self.last.lock().await;
        if let Some(next) = self.statuses.lock().await.pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}
