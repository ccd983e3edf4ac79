//! # fleet-events
//!
//! Wire types exchanged between the cloud provider and the fleet controllers.
//!
//! ## Design Principles
//!
//! - Events are decoded once at the edge of an invocation and never mutated
//! - The only output of a lifecycle invocation is its disposition
//!   (`CONTINUE` / `ABANDON`) and the invocation response
//! - Unknown enum values from the provider decode into an `Other` variant
//!   instead of failing the whole event
//!
//! ## Types
//!
//! - `LifecycleEvent`: the EventBridge envelope for an instance launch
//!   lifecycle action (`detail.EC2InstanceId`, `detail.Destination`, ...)
//! - `Destination`: where the launched instance is going (warm pool or group)
//! - `LifecycleActionResult`: how the lifecycle hook is resolved
//! - `InvocationResponse`: the `{statusCode, message}` result of an invocation

mod envelope;
mod error;
mod types;

pub use envelope::*;
pub use error::EventError;
pub use types::*;
