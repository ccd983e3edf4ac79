//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when decoding events.
#[derive(Debug, Error, Clone)]
pub enum EventError {
    /// The event payload is not a lifecycle action event.
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),

    /// A field required to resolve the lifecycle action is empty.
    #[error("lifecycle event is missing {0}")]
    MissingField(&'static str),
}

impl EventError {
    /// Stable reason code for structured logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EventError::InvalidPayload(_) => "invalid_payload",
            EventError::MissingField(_) => "missing_field",
        }
    }
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::InvalidPayload(err.to_string())
    }
}
