//! Capacity controller tick loop.
//!
//! Each tick:
//! - Reads the API token and fetches job occupancy
//! - Describes the fleet
//! - Publishes occupancy metrics under the group name, if enabled
//! - Raises desired capacity when demand exceeds it
//!
//! A tick is cancelled once it runs past its budget. A failed tick is logged
//! and the loop moves on; the loop stops once another interval plus a
//! worst-case tick would overrun the invocation deadline.

use std::sync::Arc;

use fleet_reconcile::{
    desired_capacity, FleetState, OccupancyReport, OverprovisionPolicy, ScaleDecision,
    TickSchedule,
};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ScalerError;
use crate::fleet::{FleetApi, FleetIdentity};
use crate::metrics::MetricsPublisher;
use crate::occupancy::OccupancySource;
use crate::token::TokenSource;

/// What a successful tick observed and decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub report: OccupancyReport,
    pub fleet: FleetState,
    pub decision: ScaleDecision,
}

/// Totals for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u32,
    pub failed_ticks: u32,
    pub scale_ups: u32,
}

/// Keeps fleet capacity at or above job demand.
pub struct CapacityController {
    identity: FleetIdentity,
    policy: OverprovisionPolicy,
    schedule: TickSchedule,
    tokens: Arc<dyn TokenSource>,
    occupancy: Arc<dyn OccupancySource>,
    fleet: Arc<dyn FleetApi>,
    metrics: Option<Arc<dyn MetricsPublisher>>,
}

impl CapacityController {
    /// Create a controller with the default schedule and no metrics.
    pub fn new(
        identity: FleetIdentity,
        policy: OverprovisionPolicy,
        tokens: Arc<dyn TokenSource>,
        occupancy: Arc<dyn OccupancySource>,
        fleet: Arc<dyn FleetApi>,
    ) -> Self {
        Self {
            identity,
            policy,
            schedule: TickSchedule::default(),
            tokens,
            occupancy,
            fleet,
            metrics: None,
        }
    }

    pub fn with_schedule(mut self, schedule: TickSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsPublisher>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run a single tick.
    #[instrument(skip(self), fields(fleet = %self.identity))]
    pub async fn tick(&self) -> Result<TickOutcome, ScalerError> {
        let token = self.tokens.api_token().await?;
        let report = self.occupancy.fetch_occupancy(&token).await?;
        info!(occupancy = ?report, demand = report.total(), "Fetched occupancy");

        let described = self.fleet.describe(&self.identity).await;

        if let Some(metrics) = &self.metrics {
            let group = match &described {
                Ok(fleet) => Some(fleet.name.as_str()),
                Err(_) => self.identity.group_name(),
            };
            match group {
                Some(group) => {
                    if let Err(e) = metrics.publish(group, &report).await {
                        warn!(error = %e, "Failed to publish occupancy metrics");
                    }
                }
                None => debug!("Group name unresolved, skipping occupancy metrics"),
            }
        }

        let fleet = described?;
        let decision = desired_capacity(&report, &self.policy, &fleet);

        match decision {
            ScaleDecision::ScaleTo(desired) => {
                info!(
                    group = %fleet.name,
                    demand = report.total(),
                    current = fleet.desired_capacity,
                    max = fleet.max_size,
                    desired,
                    "Scaling up"
                );
                self.fleet.set_desired_capacity(&fleet.name, desired).await?;
            }
            ScaleDecision::NoChange => {
                info!(
                    group = %fleet.name,
                    demand = report.total(),
                    current = fleet.desired_capacity,
                    "No need to scale up"
                );
            }
        }

        Ok(TickOutcome {
            report,
            fleet,
            decision,
        })
    }

    /// Tick until the deadline leaves no room for another tick.
    ///
    /// The first tick always runs. Tick failures never stop the loop.
    pub async fn run(&self, deadline: Instant) -> RunSummary {
        info!(
            fleet = %self.identity,
            interval_secs = self.schedule.interval.as_secs(),
            tick_budget_secs = self.schedule.tick_budget.as_secs(),
            "Starting capacity controller"
        );

        let mut summary = RunSummary::default();

        loop {
            summary.ticks += 1;
            let tick = tokio::time::timeout(self.schedule.tick_budget, self.tick())
                .await
                .unwrap_or_else(|_| Err(ScalerError::TickTimeout(self.schedule.tick_budget)));
            match tick {
                Ok(outcome) => {
                    if matches!(outcome.decision, ScaleDecision::ScaleTo(_)) {
                        summary.scale_ups += 1;
                    }
                }
                Err(e) => {
                    summary.failed_ticks += 1;
                    error!(
                        fleet = %self.identity,
                        error = %e,
                        reason = e.reason_code(),
                        "Capacity tick failed"
                    );
                }
            }

            if !self.schedule.has_room(Instant::now(), deadline) {
                info!(
                    ticks = summary.ticks,
                    failed_ticks = summary.failed_ticks,
                    scale_ups = summary.scale_ups,
                    "Deadline approaching, stopping capacity controller"
                );
                break;
            }

            debug!(interval_secs = self.schedule.interval.as_secs(), "Sleeping");
            tokio::time::sleep(self.schedule.interval).await;
        }

        summary
    }
}
