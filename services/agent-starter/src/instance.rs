//! Instance reachability through the Systems Manager agent.
//!
//! Remote commands can only run once the instance's SSM agent reports
//! `Online`.

use std::collections::VecDeque;

use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::types::InstanceInformationStringFilter;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StarterError;

/// Reachability of a managed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Online,
    ConnectionLost,
    Inactive,
    /// Not registered with the management service yet.
    Offline,
    Unknown(String),
}

impl InstanceStatus {
    /// Map an SSM `PingStatus` value.
    pub fn from_ping_status(status: &str) -> Self {
        match status {
            "Online" => InstanceStatus::Online,
            "ConnectionLost" => InstanceStatus::ConnectionLost,
            "Inactive" => InstanceStatus::Inactive,
            "Offline" => InstanceStatus::Offline,
            other => InstanceStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_online(&self) -> bool {
        matches!(self, InstanceStatus::Online)
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceStatus::Online => "Online",
            InstanceStatus::ConnectionLost => "ConnectionLost",
            InstanceStatus::Inactive => "Inactive",
            InstanceStatus::Offline => "Offline",
            InstanceStatus::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance status interface.
#[async_trait]
pub trait InstanceStatusApi: Send + Sync {
    async fn instance_status(&self, instance_id: &str) -> Result<InstanceStatus, StarterError>;
}

/// Reads instance status from `DescribeInstanceInformation`.
pub struct SsmInstanceStatus {
    client: aws_sdk_ssm::Client,
}

impl SsmInstanceStatus {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InstanceStatusApi for SsmInstanceStatus {
    async fn instance_status(&self, instance_id: &str) -> Result<InstanceStatus, StarterError> {
        let filter = InstanceInformationStringFilter::builder()
            .key("InstanceIds")
            .values(instance_id)
            .build()
            .map_err(|e| StarterError::InstanceStatus(e.to_string()))?;

        let output = self
            .client
            .describe_instance_information()
            .filters(filter)
            .send()
            .await
            .map_err(|e| StarterError::InstanceStatus(DisplayErrorContext(&e).to_string()))?;

        let status = match output.instance_information_list().first() {
            None => InstanceStatus::Offline,
            Some(info) => info
                .ping_status()
                .map(|s| InstanceStatus::from_ping_status(s.as_str()))
                .unwrap_or(InstanceStatus::Offline),
        };

        debug!(instance_id = %instance_id, status = %status, "Described instance");
        Ok(status)
    }
}

/// Scripted instance status for tests and local runs.
///
/// Hands out results in order and repeats the last one afterwards.
pub struct MockInstanceStatus {
    responses: Mutex<VecDeque<Result<InstanceStatus, String>>>,
    last: Mutex<Option<Result<InstanceStatus, String>>>,
    calls: Mutex<u32>,
}

impl MockInstanceStatus {
    pub fn scripted(responses: Vec<Result<InstanceStatus, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    /// Offline until the given 1-based attempt, online from then on.
    pub fn online_on_attempt(attempt: u32) -> Self {
        let mut responses: Vec<_> = (1..attempt).map(|_| Ok(InstanceStatus::Offline)).collect();
        responses.push(Ok(InstanceStatus::Online));
        Self::scripted(responses)
    }

    pub fn never_online() -> Self {
        Self::scripted(vec![Ok(InstanceStatus::ConnectionLost)])
    }

    pub fn failing(message: &str) -> Self {
        Self::scripted(vec![Err(message.to_string())])
    }

    /// Number of status queries made.
    pub async fn calls(&self) -> u32 {
        *self.calls.lock().await
    }
}

#[async_trait]
impl InstanceStatusApi for MockInstanceStatus {
    async fn instance_status(&self, _instance_id: &str) -> Result<InstanceStatus, StarterError> {
        *self.calls.lock().await += 1;

        let mut last = self.last.lock().await;
        if let Some(next) = self.responses.lock().await.pop_front() {
            *last = Some(next);
        }

        match last.clone() {
            Some(Ok(status)) => Ok(status),
            Some(Err(message)) => Err(StarterError::InstanceStatus(message)),
            None => Ok(InstanceStatus::Offline),
        }
    }
}
