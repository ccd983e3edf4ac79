//! Agent scaler
//!
//! Keeps the agent auto-scaling group at or above CI job demand. One
//! invocation ticks on a fixed interval until the host platform's deadline
//! approaches.
//!
//! ## Architecture
//!
//! - **Token source**: reads the occupancy API token (SSM SecureString)
//! - **Occupancy client**: counts queued/running jobs for the agent type
//! - **Fleet client**: describes the group and raises desired capacity
//! - **Metrics publisher**: optional occupancy counters (EMF)
//! - **Controller**: the deadline-bounded tick loop tying them together
//!
//! Every client sits behind a trait with an in-memory mock next to it.

pub mod config;
pub mod controller;
pub mod error;
pub mod fleet;
pub mod handler;
pub mod metrics;
pub mod occupancy;
pub mod token;

pub use config::Config;
pub use controller::{CapacityController, RunSummary, TickOutcome};
pub use error::ScalerError;
pub use fleet::{AutoScalingFleet, FleetApi, FleetIdentity, MockFleet};
pub use metrics::{EmfMetrics, MetricsPublisher, RecordingMetrics};
pub use occupancy::{MockOccupancy, OccupancyClient, OccupancySource};
pub use token::{SsmTokenSource, StaticToken, TokenSource};
