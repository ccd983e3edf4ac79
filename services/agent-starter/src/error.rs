//! Error types for the lifecycle starter.

use fleet_events::EventError;
use fleet_reconcile::ReconcileError;
use thiserror::Error;

/// Lifecycle starter errors.
///
/// Instance and command errors are absorbed by the starter and turned into
/// an `ABANDON` result. Configuration, event and resolution errors end the
/// invocation with an error response.
#[derive(Debug, Error)]
pub enum StarterError {
    /// A required environment variable is not set.
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// An environment variable has an unusable value.
    #[error("invalid configuration {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    /// A poll budget failed validation.
    #[error("invalid poll budget: {0}")]
    Budget(#[from] ReconcileError),

    /// The lifecycle event payload could not be decoded.
    #[error("invalid lifecycle event: {0}")]
    Event(#[from] EventError),

    /// The instance management API call failed.
    #[error("instance status query failed: {0}")]
    InstanceStatus(String),

    /// Sending or polling the remote command failed.
    #[error("remote command error: {0}")]
    Command(String),

    /// The command API accepted the request but returned no command ID.
    #[error("remote command dispatched without a command id")]
    MissingCommandId,

    /// The lifecycle hook could not be resolved.
    #[error("failed to complete lifecycle action: {0}")]
    Lifecycle(String),
}

impl StarterError {
    /// Stable reason code for structured logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            StarterError::MissingConfig(_) => "missing_config",
            StarterError::InvalidConfig { .. } => "invalid_config",
            StarterError::Budget(e) => e.reason_code(),
            StarterError::Event(e) => e.reason_code(),
            StarterError::InstanceStatus(_) => "instance_status",
            StarterError::Command(_) => "command",
            StarterError::MissingCommandId => "missing_command_id",
            StarterError::Lifecycle(_) => "lifecycle_resolution",
        }
    }

    /// Returns true if this error should stop the invocation before polling.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StarterError::MissingConfig(_)
                | StarterError::InvalidConfig { .. }
                | StarterError::Budget(_)
        )
    }
}
