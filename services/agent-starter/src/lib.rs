//! Agent starter
//!
//! Handles instance-launch lifecycle events for the agent group: waits for
//! a new instance to become manageable, runs the agent start script on it
//! and resolves the lifecycle hook.
//!
//! ## Architecture
//!
//! - **Instance status**: SSM agent reachability of one instance
//! - **Commands**: dispatches the start script and polls its status
//! - **Lifecycle**: completes the pending lifecycle action
//! - **Starter**: the bounded state machine tying them together
//!
//! Each client sits behind a trait with an in-memory mock next to it.

pub mod command;
pub mod config;
pub mod error;
pub mod handler;
pub mod instance;
pub mod lifecycle;
pub mod starter;

pub use command::{
    CommandApi, CommandExecution, CommandStatus, MockCommands, SsmCommands, StartCommand,
};
pub use config::Config;
pub use error::StarterError;
pub use instance::{InstanceStatus, InstanceStatusApi, MockInstanceStatus, SsmInstanceStatus};
pub use lifecycle::{AutoScalingLifecycle, LifecycleApi, MockLifecycle};
pub use starter::{LifecycleStarter, StartReport, StartSettings, StarterPhase};
