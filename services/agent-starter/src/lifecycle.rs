//! Lifecycle hook resolution.

use async_trait::async_trait;
use aws_sdk_autoscaling::error::DisplayErrorContext;
use fleet_events::{LifecycleActionResult, LifecycleEvent};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::StarterError;

/// Resolves a pending lifecycle action.
#[async_trait]
pub trait LifecycleApi: Send + Sync {
    async fn complete_lifecycle_action(
        &self,
        event: &LifecycleEvent,
        result: LifecycleActionResult,
    ) -> Result<(), StarterError>;
}

/// Completes lifecycle actions through the EC2 Auto Scaling API.
///
/// The client should target the region the event came from.
pub struct AutoScalingLifecycle {
    client: aws_sdk_autoscaling::Client,
}

impl AutoScalingLifecycle {
    pub fn new(client: aws_sdk_autoscaling::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LifecycleApi for AutoScalingLifecycle {
    async fn complete_lifecycle_action(
        &self,
        event: &LifecycleEvent,
        result: LifecycleActionResult,
    ) -> Result<(), StarterError> {
        info!(
            instance_id = %event.instance_id(),
            group = %event.group_name(),
            hook = %event.hook_name(),
            result = %result,
            "Completing lifecycle action"
        );

        self.client
            .complete_lifecycle_action()
            .lifecycle_action_result(result.as_str())
            .auto_scaling_group_name(event.group_name())
            .lifecycle_hook_name(event.hook_name())
            .instance_id(event.instance_id())
            .lifecycle_action_token(event.action_token())
            .send()
            .await
            .map_err(|e| StarterError::Lifecycle(DisplayErrorContext(&e).to_string()))?;

        Ok(())
    }
}

/// Records completions in memory.
#[derive(Default)]
pub struct MockLifecycle {
    completions: Mutex<Vec<(String, LifecycleActionResult)>>,
    fail: bool,
}

impl MockLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver that records and then rejects every call.
    pub fn failing() -> Self {
        Self {
            completions: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Every `(instance_id, result)` submitted.
    pub async fn completions(&self) -> Vec<(String, LifecycleActionResult)> {
        self.completions.lock().await.clone()
    }
}

#[async_trait]
impl LifecycleApi for MockLifecycle {
    async fn complete_lifecycle_action(
        &self,
        event: &LifecycleEvent,
        result: LifecycleActionResult,
    ) -> Result<(), StarterError> {
        self.completions
            .lock()
            .await
            .push((event.instance_id().to_string(), result));

        if self.fail {
            return Err(StarterError::Lifecycle("mock lifecycle configured to fail".to_string()));
        }
        Ok(())
    }
}
