//! Lifecycle event envelope as delivered by EventBridge.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EventError;
use crate::types::Destination;

/// An `EC2 Instance-launch Lifecycle Action` event.
///
/// Only the fields needed to resolve the hook are modelled; the rest of the
/// EventBridge envelope is ignored on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    /// EventBridge event ID, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Region the event was emitted in. Used to target the hook resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Event-specific payload.
    pub detail: LifecycleDetail,
}

/// The `detail` object of a lifecycle action event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleDetail {
    #[serde(rename = "EC2InstanceId")]
    pub ec2_instance_id: String,

    pub auto_scaling_group_name: String,

    pub lifecycle_hook_name: String,

    pub lifecycle_action_token: String,

    /// Missing or `null` decodes as an unrecognised destination.
    #[serde(default, deserialize_with = "destination_or_unknown")]
    pub destination: Destination,
}

fn destination_or_unknown<'de, D>(deserializer: D) -> Result<Destination, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .map(Destination::from)
        .unwrap_or_default())
}

impl LifecycleEvent {
    /// Decode a lifecycle event from a raw JSON payload.
    ///
    /// Rejects events whose identifying fields are empty, since the hook
    /// could not be resolved with them.
    pub fn from_value(value: serde_json::Value) -> Result<Self, EventError> {
        let event: LifecycleEvent = serde_json::from_value(value)?;
        event.validate()?;
        Ok(event)
    }

    fn validate(&self) -> Result<(), EventError> {
        let detail = &self.detail;
        if detail.ec2_instance_id.is_empty() {
            return Err(EventError::MissingField("EC2InstanceId"));
        }
        if detail.auto_scaling_group_name.is_empty() {
            return Err(EventError::MissingField("AutoScalingGroupName"));
        }
        if detail.lifecycle_hook_name.is_empty() {
            return Err(EventError::MissingField("LifecycleHookName"));
        }
        if detail.lifecycle_action_token.is_empty() {
            return Err(EventError::MissingField("LifecycleActionToken"));
        }
        Ok(())
    }

    pub fn instance_id(&self) -> &str {
        &self.detail.ec2_instance_id
    }

    pub fn group_name(&self) -> &str {
        &self.detail.auto_scaling_group_name
    }

    pub fn hook_name(&self) -> &str {
        &self.detail.lifecycle_hook_name
    }

    pub fn action_token(&self) -> &str {
        &self.detail.lifecycle_action_token
    }

    pub fn destination(&self) -> &Destination {
        &self.detail.destination
    }
}
