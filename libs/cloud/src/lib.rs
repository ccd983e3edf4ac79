//! Cloud plumbing shared by the fleet controllers.
//!
//! - `sdk`: one `SdkConfig` per invocation with explicit timeouts and no
//!   automatic retries, so a failed call fails the current tick or poll.
//! - `deadline`: converts the host platform's wall-clock deadline into a
//!   monotonic instant the loops can compare against.
//! - `telemetry`: JSON `tracing` subscriber setup for the binaries.

pub mod deadline;
pub mod sdk;
pub mod telemetry;

pub use deadline::{deadline_from_epoch_millis, deadline_in};
pub use sdk::{load_sdk_config, ClientTimeouts};
pub use telemetry::init_tracing;
