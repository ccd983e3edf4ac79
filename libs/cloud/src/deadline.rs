//! Invocation deadlines.

use std::time::Duration;

use tokio::time::Instant;

/// Convert a wall-clock deadline in epoch milliseconds (as reported by the
/// Lambda context) into a monotonic instant.
///
/// A deadline already in the past maps to "now".
pub fn deadline_from_epoch_millis(deadline_ms: u64) -> Instant {
    let now_ms = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
    deadline_in(Duration::from_millis(deadline_ms.saturating_sub(now_ms)))
}

/// A deadline `remaining` from now.
pub fn deadline_in(remaining: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(remaining).unwrap_or(now)
}
