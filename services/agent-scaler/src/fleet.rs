//! Fleet client: reads and raises auto-scaling group capacity.

use async_trait::async_trait;
use aws_sdk_autoscaling::error::DisplayErrorContext;
use aws_sdk_autoscaling::types::{AutoScalingGroup, Filter};
use fleet_reconcile::FleetState;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ScalerError;

/// Tag CloudFormation puts on every resource of a stack.
const STACK_NAME_TAG: &str = "tag:aws:cloudformation:stack-name";

/// How the managed group is identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FleetIdentity {
    /// Exact auto-scaling group name.
    GroupName(String),
    /// Name of the stack that owns the group.
    StackName(String),
}

impl FleetIdentity {
    /// The group name, when configured directly.
    pub fn group_name(&self) -> Option<&str> {
        match self {
            FleetIdentity::GroupName(name) => Some(name),
            FleetIdentity::StackName(_) => None,
        }
    }
}

impl std::fmt::Display for FleetIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FleetIdentity::GroupName(name) => write!(f, "{}", name),
            FleetIdentity::StackName(stack) => write!(f, "stack:{}", stack),
        }
    }
}

/// Scaling API interface.
#[async_trait]
pub trait FleetApi: Send + Sync {
    /// Describe the group matching `identity`.
    async fn describe(&self, identity: &FleetIdentity) -> Result<FleetState, ScalerError>;

    /// Set desired capacity, ignoring cooldowns.
    async fn set_desired_capacity(&self, name: &str, desired: u32) -> Result<(), ScalerError>;
}

/// Fleet client backed by the EC2 Auto Scaling API.
pub struct AutoScalingFleet {
    client: aws_sdk_autoscaling::Client,
}

impl AutoScalingFleet {
    pub fn new(client: aws_sdk_autoscaling::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FleetApi for AutoScalingFleet {
    async fn describe(&self, identity: &FleetIdentity) -> Result<FleetState, ScalerError> {
        debug!(fleet = %identity, "Describing auto scaling group");

        let request = self.client.describe_auto_scaling_groups();
        let request = match identity {
            FleetIdentity::GroupName(name) => request.auto_scaling_group_names(name),
            FleetIdentity::StackName(stack) => request.filters(
                Filter::builder()
                    .name(STACK_NAME_TAG)
                    .values(stack)
                    .build(),
            ),
        };

        let output = request
            .send()
            .await
            .map_err(|e| ScalerError::Fleet(DisplayErrorContext(&e).to_string()))?;

        let group = output
            .auto_scaling_groups()
            .first()
            .ok_or_else(|| ScalerError::FleetNotFound(identity.to_string()))?;

        Ok(fleet_state(group))
    }

    async fn set_desired_capacity(&self, name: &str, desired: u32) -> Result<(), ScalerError> {
        let desired = i32::try_from(desired)
            .map_err(|_| ScalerError::Fleet(format!("desired capacity {} out of range", desired)))?;

        self.client
            .set_desired_capacity()
            .auto_scaling_group_name(name)
            .desired_capacity(desired)
            .honor_cooldown(false)
            .send()
            .await
            .map_err(|e| ScalerError::Fleet(DisplayErrorContext(&e).to_string()))?;

        info!(fleet = %name, desired, "Desired capacity updated");
        Ok(())
    }
}

fn fleet_state(group: &AutoScalingGroup) -> FleetState {
    FleetState {
        name: text(group.auto_scaling_group_name()),
        desired_capacity: size(group.desired_capacity()),
        min_size: size(group.min_size()),
        max_size: size(group.max_size()),
    }
}

fn text<'a>(value: impl Into<Option<&'a str>>) -> String {
    value.into().unwrap_or_default().to_string()
}

fn size(value: impl Into<Option<i32>>) -> u32 {
    value
        .into()
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

/// In-memory fleet for tests and local runs.
///
/// `set_desired_capacity` updates the stored state so later ticks observe it.
pub struct MockFleet {
    state: Mutex<Option<FleetState>>,
    set_calls: Mutex<Vec<(String, u32)>>,
    fail_updates: bool,
}

impl MockFleet {
    pub fn new(state: FleetState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
            set_calls: Mutex::new(Vec::new()),
            fail_updates: false,
        }
    }

    /// A fleet whose group does not exist.
    pub fn missing() -> Self {
        Self {
            state: Mutex::new(None),
            set_calls: Mutex::new(Vec::new()),
            fail_updates: false,
        }
    }

    /// A fleet that rejects every capacity update.
    pub fn failing_updates(state: FleetState) -> Self {
        Self {
            fail_updates: true,
            ..Self::new(state)
        }
    }

    /// Every `(name, desired)` passed to `set_desired_capacity`.
    pub async fn set_calls(&self) -> Vec<(String, u32)> {
        self.set_calls.lock().await.clone()
    }

    /// Current stored state.
    pub async fn state(&self) -> Option<FleetState> {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl FleetApi for MockFleet {
    async fn describe(&self, identity: &FleetIdentity) -> Result<FleetState, ScalerError> {
        self.state
            .lock()
            .await
            .clone()
            .ok_or_else(|| ScalerError::FleetNotFound(identity.to_string()))
    }

    async fn set_desired_capacity(&self, name: &str, desired: u32) -> Result<(), ScalerError> {
        self.set_calls.lock().await.push((name.to_string(), desired));

        if self.fail_updates {
            return Err(ScalerError::Fleet("mock fleet configured to fail".to_string()));
        }

        if let Some(state) = self.state.lock().await.as_mut() {
            state.desired_capacity = desired;
        }
        Ok(())
    }
}
