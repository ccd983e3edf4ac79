//! Lifecycle starter state machine.
//!
//! For an instance entering the group:
//! 1. Poll until the instance is manageable, or give up
//! 2. Dispatch the agent start command
//! 3. Poll the command until it reaches a terminal status
//! 4. Resolve the lifecycle hook with `CONTINUE` or `ABANDON`
//!
//! Instances entering the warm pool are resolved with `CONTINUE` right away.
//! Every path resolves the hook exactly once; only a failed resolution is
//! returned as an error.

use std::sync::Arc;

use fleet_events::{Destination, LifecycleActionResult, LifecycleEvent};
use fleet_reconcile::{poll_until, PollBudget, PollOutcome};
use tracing::{debug, error, info, instrument, warn};

use crate::command::{CommandApi, CommandExecution, CommandStatus, StartCommand};
use crate::config::Config;
use crate::error::StarterError;
use crate::instance::{InstanceStatus, InstanceStatusApi};
use crate::lifecycle::LifecycleApi;

/// States a single invocation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarterPhase {
    Idle,
    PollingInstanceStatus,
    Online,
    GaveUpWaiting,
    DispatchingCommand,
    PollingCommandStatus,
    CommandSucceeded,
    CommandFailed,
    ResolvingLifecycle,
    Done,
}

/// Record of one handled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    /// The disposition the hook was resolved with.
    pub result: LifecycleActionResult,
    /// Phases entered, in order.
    pub phases: Vec<StarterPhase>,
    /// Instance status probes made.
    pub instance_attempts: u32,
    /// The start command, if one was dispatched.
    pub command: Option<CommandExecution>,
    /// The failure that forced `ABANDON`, if any.
    pub failure: Option<String>,
}

impl StartReport {
    fn new() -> Self {
        Self {
            result: LifecycleActionResult::Continue,
            phases: vec![StarterPhase::Idle],
            instance_attempts: 0,
            command: None,
            failure: None,
        }
    }

    fn enter(&mut self, phase: StarterPhase) {
        debug!(phase = ?phase, "Entering phase");
        self.phases.push(phase);
    }

    pub fn visited(&self, phase: StarterPhase) -> bool {
        self.phases.contains(&phase)
    }
}

/// Poll budgets and the command to run.
#[derive(Debug, Clone)]
pub struct StartSettings {
    pub start_command: StartCommand,
    pub instance_poll: PollBudget,
    pub command_poll: PollBudget,
}

impl From<&Config> for StartSettings {
    fn from(config: &Config) -> Self {
        Self {
            start_command: config.start_command.clone(),
            instance_poll: config.instance_poll,
            command_poll: config.command_poll,
        }
    }
}

/// Drives one lifecycle event to a resolved hook.
pub struct LifecycleStarter {
    instances: Arc<dyn InstanceStatusApi>,
    commands: Arc<dyn CommandApi>,
    lifecycle: Arc<dyn LifecycleApi>,
    settings: StartSettings,
}

impl LifecycleStarter {
    pub fn new(
        instances: Arc<dyn InstanceStatusApi>,
        commands: Arc<dyn CommandApi>,
        lifecycle: Arc<dyn LifecycleApi>,
        settings: StartSettings,
    ) -> Self {
        Self {
            instances,
            commands,
            lifecycle,
            settings,
        }
    }

    /// Handle one lifecycle event and resolve its hook.
    #[instrument(skip(self, event), fields(instance_id = %event.instance_id(), destination = %event.destination()))]
    pub async fn handle(&self, event: &LifecycleEvent) -> Result<StartReport, StarterError> {
        let mut report = StartReport::new();

        let result = match event.destination() {
            Destination::WarmPool => {
                info!("Instance entered the warm pool, nothing to start");
                LifecycleActionResult::Continue
            }
            Destination::AutoScalingGroup => {
                match self.start_agent(event.instance_id(), &mut report).await {
                    Ok(result) => result,
                    Err(e) => {
                        warn!(
                            error = %e,
                            reason = e.reason_code(),
                            "Failed to start agent, abandoning instance"
                        );
                        report.failure = Some(e.to_string());
                        LifecycleActionResult::Abandon
                    }
                }
            }
            Destination::Other(destination) => {
                info!(destination = %destination, "Unknown destination, ignoring");
                LifecycleActionResult::Continue
            }
        };

        report.enter(StarterPhase::ResolvingLifecycle);
        if let Err(e) = self.lifecycle.complete_lifecycle_action(event, result).await {
            error!(
                error = %e,
                reason = e.reason_code(),
                result = %result,
                "Failed to complete lifecycle action"
            );
            return Err(e);
        }

        report.result = result;
        report.enter(StarterPhase::Done);
        info!(result = %result, "Lifecycle action completed");
        Ok(report)
    }

    /// Wait for the instance, run the start command and decide the result.
    async fn start_agent(
        &self,
        instance_id: &str,
        report: &mut StartReport,
    ) -> Result<LifecycleActionResult, StarterError> {
        report.enter(StarterPhase::PollingInstanceStatus);
        let outcome = poll_until(
            &self.settings.instance_poll,
            move |attempt| self.probe_instance(instance_id, attempt),
            InstanceStatus::is_online,
        )
        .await?;
        report.instance_attempts = outcome.attempts();

        match outcome {
            PollOutcome::Ready { attempts, .. } => {
                report.enter(StarterPhase::Online);
                info!(attempts, "Instance is online");
            }
            PollOutcome::Exhausted { last, attempts } => {
                report.enter(StarterPhase::GaveUpWaiting);
                info!(
                    attempts,
                    status = %last.unwrap_or(InstanceStatus::Offline),
                    "Instance never came online, giving up"
                );
                return Ok(LifecycleActionResult::Abandon);
            }
        }

        report.enter(StarterPhase::DispatchingCommand);
        let command_id = self
            .commands
            .send_start_command(instance_id, &self.settings.start_command)
            .await?;

        report.enter(StarterPhase::PollingCommandStatus);
        let id = command_id.as_str();
        let outcome = poll_until(
            &self.settings.command_poll,
            move |attempt| self.probe_command(id, attempt),
            CommandStatus::is_terminal,
        )
        .await?;

        let status = match outcome {
            PollOutcome::Ready { value, .. } => value,
            PollOutcome::Exhausted { last, attempts } => {
                warn!(
                    command_id = %command_id,
                    attempts,
                    status = %last.unwrap_or(CommandStatus::Pending),
                    "Command did not finish in time"
                );
                CommandStatus::TimedOut
            }
        };

        let execution = CommandExecution { command_id, status };
        let result = if execution.status == CommandStatus::Success {
            report.enter(StarterPhase::CommandSucceeded);
            info!(command_id = %execution.command_id, "Agent started");
            LifecycleActionResult::Continue
        } else {
            report.enter(StarterPhase::CommandFailed);
            warn!(
                command_id = %execution.command_id,
                status = %execution.status,
                "Start command failed, abandoning instance"
            );
            LifecycleActionResult::Abandon
        };
        report.command = Some(execution);

        Ok(result)
    }

    async fn probe_instance(
        &self,
        instance_id: &str,
        attempt: u32,
    ) -> Result<InstanceStatus, StarterError> {
        let status = self.instances.instance_status(instance_id).await?;
        debug!(attempt, status = %status, "Checked instance status");
        Ok(status)
    }

    async fn probe_command(
        &self,
        command_id: &str,
        attempt: u32,
    ) -> Result<CommandStatus, StarterError> {
        let status = self.commands.command_status(command_id).await?;
        debug!(attempt, command_id = %command_id, status = %status, "Checked command status");
        Ok(status)
    }
}
