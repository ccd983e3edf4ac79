//! Bounded polling and deadline-aware tick scheduling.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::ReconcileError;

/// How many times to probe and how long to wait between probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    max_attempts: u32,
    interval: Duration,
}

impl PollBudget {
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self, ReconcileError> {
        if max_attempts == 0 {
            return Err(ReconcileError::EmptyBudget);
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Upper bound on the time spent sleeping between probes.
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts.saturating_sub(1)
    }
}

/// Result of a bounded poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe returned a terminal value on the given attempt (1-based).
    Ready { value: T, attempts: u32 },
    /// Every attempt returned a non-terminal value.
    Exhausted { last: Option<T>, attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Ready { attempts, .. } | PollOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Probe until `is_terminal` accepts a value or the budget runs out.
///
/// Sleeps `budget.interval()` between attempts but not after the last one.
/// A probe error ends the poll immediately and is returned as-is.
pub async fn poll_until<T, E, F, Fut, P>(
    budget: &PollBudget,
    mut probe: F,
    is_terminal: P,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&T) -> bool,
{
    let mut last = None;

    for attempt in 1..=budget.max_attempts {
        let value = probe(attempt).await?;
        if is_terminal(&value) {
            return Ok(PollOutcome::Ready {
                value,
                attempts: attempt,
            });
        }
        last = Some(value);

        if attempt < budget.max_attempts {
            tokio::time::sleep(budget.interval).await;
        }
    }

    Ok(PollOutcome::Exhausted {
        last,
        attempts: budget.max_attempts,
    })
}

/// Fixed-interval tick loop bounded by an invocation deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    /// Wait between the end of one tick and the start of the next.
    pub interval: Duration,
    /// Worst-case duration of a single tick.
    pub tick_budget: Duration,
}

impl TickSchedule {
    pub fn new(interval: Duration, tick_budget: Duration) -> Self {
        Self {
            interval,
            tick_budget,
        }
    }

    /// Whether sleeping one interval and running one more worst-case tick
    /// still finishes strictly before `deadline`.
    pub fn has_room(&self, now: Instant, deadline: Instant) -> bool {
        match now
            .checked_add(self.interval)
            .and_then(|t| t.checked_add(self.tick_budget))
        {
            Some(finish) => finish < deadline,
            None => false,
        }
    }
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TICK_INTERVAL, crate::DEFAULT_TICK_BUDGET)
    }
}
