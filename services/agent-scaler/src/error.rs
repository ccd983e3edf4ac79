//! Error types for the capacity controller.

use std::time::Duration;

use fleet_reconcile::ReconcileError;
use thiserror::Error;

/// Capacity controller errors.
///
/// Configuration errors stop an invocation before the first tick; every
/// other variant only fails the tick it happened in.
#[derive(Debug, Error)]
pub enum ScalerError {
    /// A required environment variable is not set.
    #[error("missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// An environment variable has an unusable value.
    #[error("invalid configuration {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    /// The overprovision policy failed validation.
    #[error("invalid overprovision policy: {0}")]
    Policy(#[from] ReconcileError),

    /// The occupancy API could not be reached.
    #[error("occupancy request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The occupancy API answered with a non-200 status.
    #[error("occupancy API returned {status}: {body}")]
    OccupancyStatus { status: u16, body: String },

    /// The occupancy API answered with a body we could not decode.
    #[error("malformed occupancy response: {0}")]
    MalformedResponse(String),

    /// No auto-scaling group matches the configured identity.
    #[error("could not find auto scaling group for {0}")]
    FleetNotFound(String),

    /// The scaling API call failed.
    #[error("auto scaling API error: {0}")]
    Fleet(String),

    /// The API token could not be read.
    #[error("failed to read API token: {0}")]
    Token(String),

    /// Metrics could not be emitted.
    #[error("failed to publish metrics: {0}")]
    Metrics(String),

    /// A tick ran past its budget and was cancelled.
    #[error("tick exceeded its {0:?} budget")]
    TickTimeout(Duration),
}

impl ScalerError {
    /// Stable reason code for structured logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ScalerError::MissingConfig(_) => "missing_config",
            ScalerError::InvalidConfig { .. } => "invalid_config",
            ScalerError::Policy(_) => "invalid_policy",
            ScalerError::Http(_) => "occupancy_unreachable",
            ScalerError::OccupancyStatus { .. } => "occupancy_status",
            ScalerError::MalformedResponse(_) => "malformed_response",
            ScalerError::FleetNotFound(_) => "fleet_not_found",
            ScalerError::Fleet(_) => "fleet_api",
            ScalerError::Token(_) => "token",
            ScalerError::Metrics(_) => "metrics",
            ScalerError::TickTimeout(_) => "tick_timeout",
        }
    }

    /// Returns true if this error should stop the invocation before ticking.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ScalerError::MissingConfig(_) | ScalerError::InvalidConfig { .. } | ScalerError::Policy(_)
        )
    }
}
