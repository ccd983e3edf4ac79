//! Capacity decisions and loop primitives.
//!
//! This library holds the I/O-free core of the fleet controllers:
//!
//! - **Demand**: an `OccupancyReport` counting jobs by state.
//! - **Capacity**: a `FleetState` read fresh from the provider every tick.
//! - **Decision**: `desired_capacity` turns demand, policy and fleet bounds
//!   into a `ScaleDecision`.
//! - **Loops**: `PollBudget`/`poll_until` for bounded waits and
//!   `TickSchedule` for deadline-aware tick loops.
//!
//! # Invariants
//!
//! - Decisions are deterministic given the same inputs
//! - A decision never lowers desired capacity
//! - A decision never exceeds the group's `max_size`

use std::time::Duration;

use thiserror::Error;

mod capacity;
mod poll;

pub use capacity::{
    desired_capacity, FleetState, OccupancyReport, OverprovisionPolicy, OverprovisionStrategy,
    ScaleDecision, STATE_QUEUED, STATE_RUNNING,
};
pub use poll::{poll_until, PollBudget, PollOutcome, TickSchedule};

/// Reconciliation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The overprovision strategy name is not recognised.
    #[error("unknown overprovision strategy: {0}")]
    UnknownStrategy(String),

    /// The overprovision factor is not valid for the strategy.
    #[error("overprovision strategy '{strategy}' requires a factor >= 1, got {factor}")]
    InvalidFactor {
        strategy: OverprovisionStrategy,
        factor: u32,
    },

    /// A poll budget with no attempts.
    #[error("poll budget must allow at least one attempt")]
    EmptyBudget,
}

impl ReconcileError {
    /// Stable reason code for structured logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            ReconcileError::UnknownStrategy(_) => "unknown_strategy",
            ReconcileError::InvalidFactor { .. } => "invalid_factor",
            ReconcileError::EmptyBudget => "empty_budget",
        }
    }
}

/// Default interval between capacity ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(10);

/// Default worst-case duration of a single tick. Matches the default
/// per-call client timeout.
pub const DEFAULT_TICK_BUDGET: Duration = Duration::from_secs(10);

/// Default number of instance status checks before giving up.
pub const DEFAULT_INSTANCE_POLL_ATTEMPTS: u32 = 12;

/// Default interval between instance status checks.
pub const DEFAULT_INSTANCE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of command status checks before giving up.
pub const DEFAULT_COMMAND_POLL_ATTEMPTS: u32 = 12;

/// Default interval between command status checks.
pub const DEFAULT_COMMAND_POLL_INTERVAL: Duration = Duration::from_secs(2);
