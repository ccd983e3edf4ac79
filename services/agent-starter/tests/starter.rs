//! Integration tests for the lifecycle starter.
//!
//! Clients are in-memory mocks and the tokio clock is paused, so the full
//! polling budgets run instantly.

use std::sync::Arc;
use std::time::Duration;

use fleet_agent_starter::{
    CommandStatus, InstanceStatus, LifecycleStarter, MockCommands, MockInstanceStatus,
    MockLifecycle, StartCommand, StartSettings, StarterPhase,
};
use fleet_events::{LifecycleActionResult, LifecycleEvent};
use fleet_reconcile::PollBudget;
use tokio::time::Instant;

fn event(destination: &str) -> LifecycleEvent {
    LifecycleEvent::from_value(serde_json::json!({
        "version": "0",
        "id": "7a3c2b1e-0000-4000-8000-000000000001",
        "detail-type": "EC2 Instance-launch Lifecycle Action",
        "source": "aws.autoscaling",
        "region": "us-east-1",
        "detail": {
            "LifecycleActionToken": "87654321-4321-4321-4321-210987654321",
            "AutoScalingGroupName": "agents-asg",
            "LifecycleHookName": "agents-launch-hook",
            "EC2InstanceId": "i-0123456789abcdef0",
            "LifecycleTransition": "autoscaling:EC2_INSTANCE_LAUNCHING",
            "Origin": "EC2",
            "Destination": destination
        }
    }))
    .unwrap()
}

fn settings() -> StartSettings {
    StartSettings {
        start_command: StartCommand {
            script: "/opt/semaphore/install-agent.sh".to_string(),
            config_ref: "agents-config".to_string(),
            execution_timeout: Duration::from_secs(20),
        },
        instance_poll: PollBudget::new(12, Duration::from_secs(5)).unwrap(),
        command_poll: PollBudget::new(12, Duration::from_secs(2)).unwrap(),
    }
}

struct Harness {
    instances: Arc<MockInstanceStatus>,
    commands: Arc<MockCommands>,
    lifecycle: Arc<MockLifecycle>,
}

impl Harness {
    fn new(instances: MockInstanceStatus, commands: MockCommands) -> Self {
        Self::with_lifecycle(instances, commands, MockLifecycle::new())
    }

    fn with_lifecycle(
        instances: MockInstanceStatus,
        commands: MockCommands,
        lifecycle: MockLifecycle,
    ) -> Self {
        Self {
            instances: Arc::new(instances),
            commands: Arc::new(commands),
            lifecycle: Arc::new(lifecycle),
        }
    }

    fn starter(&self) -> LifecycleStarter {
        LifecycleStarter::new(
            self.instances.clone(),
            self.commands.clone(),
            self.lifecycle.clone(),
            settings(),
        )
    }

    async fn resolved(&self) -> Vec<LifecycleActionResult> {
        self.lifecycle
            .completions()
            .await
            .into_iter()
            .map(|(_, result)| result)
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn test_warm_pool_continues_without_polling() {
    let harness = Harness::new(
        MockInstanceStatus::online_on_attempt(1),
        MockCommands::finishes_on_attempt(1, CommandStatus::Success),
    );

    let report = harness.starter().handle(&event("WarmPool")).await.unwrap();

    assert_eq!(report.result, LifecycleActionResult::Continue);
    assert!(!report.visited(StarterPhase::PollingInstanceStatus));
    assert_eq!(harness.instances.calls().await, 0);
    assert!(harness.commands.dispatched().await.is_empty());
    assert_eq!(harness.resolved().await, vec![LifecycleActionResult::Continue]);
}

#[tokio::test(start_paused = true)]
async fn test_online_then_success_continues() {
    let harness = Harness::new(
        MockInstanceStatus::online_on_attempt(3),
        MockCommands::finishes_on_attempt(5, CommandStatus::Success),
    );

    let start = Instant::now();
    let report = harness
        .starter()
        .handle(&event("AutoScalingGroup"))
        .await
        .unwrap();

    assert_eq!(report.result, LifecycleActionResult::Continue);
    assert_eq!(report.instance_attempts, 3);
    assert_eq!(
        report.phases,
        vec![
            StarterPhase::Idle,
            StarterPhase::PollingInstanceStatus,
            StarterPhase::Online,
            StarterPhase::DispatchingCommand,
            StarterPhase::PollingCommandStatus,
            StarterPhase::CommandSucceeded,
            StarterPhase::ResolvingLifecycle,
            StarterPhase::Done,
        ]
    );
    assert_eq!(harness.instances.calls().await, 3);
    assert_eq!(harness.commands.status_calls().await, 5);
    assert_eq!(
        harness.commands.dispatched().await,
        vec![(
            "i-0123456789abcdef0".to_string(),
            "/opt/semaphore/install-agent.sh agents-config".to_string()
        )]
    );
    assert_eq!(
        harness.lifecycle.completions().await,
        vec![(
            "i-0123456789abcdef0".to_string(),
            LifecycleActionResult::Continue
        )]
    );

    // Two instance waits of 5s and four command waits of 2s.
    assert_eq!(start.elapsed(), Duration::from_secs(18));
}

#[tokio::test(start_paused = true)]
async fn test_never_online_abandons_without_dispatch() {
    let harness = Harness::new(
        MockInstanceStatus::never_online(),
        MockCommands::finishes_on_attempt(1, CommandStatus::Success),
    );

    let start = Instant::now();
    let report = harness
        .starter()
        .handle(&event("AutoScalingGroup"))
        .await
        .unwrap();

    assert_eq!(report.result, LifecycleActionResult::Abandon);
    assert!(report.visited(StarterPhase::GaveUpWaiting));
    assert!(!report.visited(StarterPhase::DispatchingCommand));
    assert_eq!(harness.instances.calls().await, 12);
    assert!(harness.commands.dispatched().await.is_empty());
    assert_eq!(harness.resolved().await, vec![LifecycleActionResult::Abandon]);
    assert_eq!(start.elapsed(), Duration::from_secs(55));
}

#[tokio::test(start_paused = true)]
async fn test_failed_command_abandons() {
    let harness = Harness::new(
        MockInstanceStatus::online_on_attempt(1),
        MockCommands::finishes_on_attempt(2, CommandStatus::Failed),
    );

    let report = harness
        .starter()
        .handle(&event("AutoScalingGroup"))
        .await
        .unwrap();

    assert_eq!(report.result, LifecycleActionResult::Abandon);
    assert!(report.visited(StarterPhase::CommandFailed));
    assert_eq!(
        report.command.map(|c| c.status),
        Some(CommandStatus::Failed)
    );
    assert_eq!(harness.resolved().await, vec![LifecycleActionResult::Abandon]);
}

#[tokio::test(start_paused = true)]
async fn test_unfinished_command_times_out() {
    let harness = Harness::new(
        MockInstanceStatus::online_on_attempt(1),
        MockCommands::scripted(vec![CommandStatus::Pending, CommandStatus::InProgress]),
    );

    let report = harness
        .starter()
        .handle(&event("AutoScalingGroup"))
        .await
        .unwrap();

    assert_eq!(report.result, LifecycleActionResult::Abandon);
    assert_eq!(
        report.command.map(|c| c.status),
        Some(CommandStatus::TimedOut)
    );
    assert_eq!(harness.commands.status_calls().await, 12);
}

#[tokio::test(start_paused = true)]
async fn test_status_api_error_abandons() {
    let harness = Harness::new(
        MockInstanceStatus::scripted(vec![
            Ok(InstanceStatus::Offline),
            Err("throttled".to_string()),
        ]),
        MockCommands::finishes_on_attempt(1, CommandStatus::Success),
    );

    let report = harness
        .starter()
        .handle(&event("AutoScalingGroup"))
        .await
        .unwrap();

    assert_eq!(report.result, LifecycleActionResult::Abandon);
    assert!(report.failure.unwrap().contains("throttled"));
    assert_eq!(harness.instances.calls().await, 2);
    assert!(harness.commands.dispatched().await.is_empty());
    assert_eq!(harness.resolved().await, vec![LifecycleActionResult::Abandon]);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_error_abandons() {
    let harness = Harness::new(
        MockInstanceStatus::online_on_attempt(1),
        MockCommands::failing_dispatch(),
    );

    let report = harness
        .starter()
        .handle(&event("AutoScalingGroup"))
        .await
        .unwrap();

    assert_eq!(report.result, LifecycleActionResult::Abandon);
    assert!(report.failure.is_some());
    assert_eq!(harness.commands.status_calls().await, 0);
    assert_eq!(harness.resolved().await, vec![LifecycleActionResult::Abandon]);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_destination_is_ignored() {
    let harness = Harness::new(
        MockInstanceStatus::online_on_attempt(1),
        MockCommands::finishes_on_attempt(1, CommandStatus::Success),
    );

    let report = harness
        .starter()
        .handle(&event("Standby"))
        .await
        .unwrap();

    assert_eq!(report.result, LifecycleActionResult::Continue);
    assert_eq!(harness.instances.calls().await, 0);
    assert_eq!(harness.resolved().await, vec![LifecycleActionResult::Continue]);
}

#[tokio::test(start_paused = true)]
async fn test_resolution_failure_is_returned() {
    let harness = Harness::with_lifecycle(
        MockInstanceStatus::online_on_attempt(1),
        MockCommands::finishes_on_attempt(1, CommandStatus::Success),
        MockLifecycle::failing(),
    );

    let err = harness
        .starter()
        .handle(&event("AutoScalingGroup"))
        .await
        .unwrap_err();

    assert_eq!(err.reason_code(), "lifecycle_resolution");
    assert_eq!(harness.resolved().await, vec![LifecycleActionResult::Continue]);
}
