//! Enumerations and response types shared by the fleet controllers.

use serde::{Deserialize, Serialize};

// =============================================================================
// Lifecycle
// =============================================================================

/// Where a launching instance is headed.
///
/// The provider sends `"WarmPool"` when the instance is being pre-initialised
/// and `"AutoScalingGroup"` when it is entering service. Anything else is kept
/// verbatim so it can be logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Destination {
    WarmPool,
    AutoScalingGroup,
    Other(String),
}

impl Destination {
    pub fn as_str(&self) -> &str {
        match self {
            Destination::WarmPool => "WarmPool",
            Destination::AutoScalingGroup => "AutoScalingGroup",
            Destination::Other(s) => s,
        }
    }
}

/// An absent destination is treated like any unrecognised one.
impl Default for Destination {
    fn default() -> Self {
        Destination::Other(String::new())
    }
}

impl From<String> for Destination {
    fn from(value: String) -> Self {
        match value.as_str() {
            "WarmPool" => Destination::WarmPool,
            "AutoScalingGroup" => Destination::AutoScalingGroup,
            _ => Destination::Other(value),
        }
    }
}

impl From<Destination> for String {
    fn from(value: Destination) -> Self {
        match value {
            Destination::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Disposition of a lifecycle hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleActionResult {
    /// Let the instance proceed into service.
    #[default]
    Continue,
    /// Terminate the instance.
    Abandon,
}

impl LifecycleActionResult {
    /// The value expected by the `CompleteLifecycleAction` API.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleActionResult::Continue => "CONTINUE",
            LifecycleActionResult::Abandon => "ABANDON",
        }
    }
}

impl std::fmt::Display for LifecycleActionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Invocation
// =============================================================================

/// Result of a single controller invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub message: String,
}

impl InvocationResponse {
    pub fn success() -> Self {
        Self {
            status_code: 200,
            message: "success".to_string(),
        }
    }

    pub fn error() -> Self {
        Self {
            status_code: 500,
            message: "error".to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_known_values() {
        let warm: Destination = serde_json::from_str("\"WarmPool\"").unwrap();
        let group: Destination = serde_json::from_str("\"AutoScalingGroup\"").unwrap();
        assert_eq!(warm, Destination::WarmPool);
        assert_eq!(group, Destination::AutoScalingGroup);
    }

    #[test]
    fn test_destination_unknown_value_is_preserved() {
        let other: Destination = serde_json::from_str("\"Hibernated\"").unwrap();
        assert_eq!(other, Destination::Other("Hibernated".to_string()));
        assert_eq!(serde_json::to_string(&other).unwrap(), "\"Hibernated\"");
    }

    #[test]
    fn test_lifecycle_action_result_serialization() {
        assert_eq!(
            serde_json::to_string(&LifecycleActionResult::Continue).unwrap(),
            "\"CONTINUE\""
        );
        assert_eq!(
            serde_json::to_string(&LifecycleActionResult::Abandon).unwrap(),
            "\"ABANDON\""
        );
        assert_eq!(LifecycleActionResult::default(), LifecycleActionResult::Continue);
    }

    #[test]
    fn test_invocation_response_shape() {
        let json = serde_json::to_value(InvocationResponse::error()).unwrap();
        assert_eq!(json["statusCode"], 500);
        assert_eq!(json["message"], "error");
        assert!(InvocationResponse::success().is_success());
    }
}
