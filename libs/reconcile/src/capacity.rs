//! Demand, fleet state and the scale-up decision.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::ReconcileError;

/// Job state for jobs waiting for an agent.
pub const STATE_QUEUED: &str = "QUEUED";

/// Job state for jobs currently running on an agent.
pub const STATE_RUNNING: &str = "RUNNING";

/// Job counts by state for one agent type.
///
/// Always reports `QUEUED` and `RUNNING`, even when no job is in those states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyReport {
    counts: BTreeMap<String, u32>,
}

impl OccupancyReport {
    /// Create an empty report with zeroed `QUEUED` and `RUNNING` counts.
    pub fn new() -> Self {
        let mut counts = BTreeMap::new();
        counts.insert(STATE_QUEUED.to_string(), 0);
        counts.insert(STATE_RUNNING.to_string(), 0);
        Self { counts }
    }

    /// Count one more job in `state`.
    pub fn record(&mut self, state: &str) {
        let count = self.counts.entry(state.to_string()).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// Builder-style setter, mostly for tests and fakes.
    pub fn with_count(mut self, state: &str, count: u32) -> Self {
        self.counts.insert(state.to_string(), count);
        self
    }

    /// Number of jobs in `state`.
    pub fn count(&self, state: &str) -> u32 {
        self.counts.get(state).copied().unwrap_or(0)
    }

    /// Sum of all state counts.
    pub fn total(&self) -> u32 {
        let total: u64 = self.counts.values().map(|c| u64::from(*c)).sum();
        u32::try_from(total).unwrap_or(u32::MAX)
    }

    /// Iterate over `(state, count)` pairs in state order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(state, count)| (state.as_str(), *count))
    }
}

impl Default for OccupancyReport {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> FromIterator<&'a str> for OccupancyReport {
    fn from_iter<I: IntoIterator<Item = &'a str>>(states: I) -> Self {
        let mut report = OccupancyReport::new();
        for state in states {
            report.record(state);
        }
        report
    }
}

/// Capacity bounds of an auto-scaling group, as last described.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FleetState {
    pub name: String,
    pub desired_capacity: u32,
    pub min_size: u32,
    pub max_size: u32,
}

/// How much headroom to request above measured demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverprovisionStrategy {
    #[default]
    None,
    Number,
    Percentage,
}

impl OverprovisionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverprovisionStrategy::None => "none",
            OverprovisionStrategy::Number => "number",
            OverprovisionStrategy::Percentage => "percentage",
        }
    }
}

impl FromStr for OverprovisionStrategy {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "none" => Ok(OverprovisionStrategy::None),
            "number" => Ok(OverprovisionStrategy::Number),
            "percentage" => Ok(OverprovisionStrategy::Percentage),
            _ => Err(ReconcileError::UnknownStrategy(s.to_string())),
        }
    }
}

impl std::fmt::Display for OverprovisionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated overprovision policy.
///
/// `number` and `percentage` always carry a factor of at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverprovisionPolicy {
    strategy: OverprovisionStrategy,
    factor: u32,
}

impl OverprovisionPolicy {
    /// Validate and build a policy.
    pub fn new(strategy: OverprovisionStrategy, factor: u32) -> Result<Self, ReconcileError> {
        match strategy {
            OverprovisionStrategy::None => Ok(Self { strategy, factor: 0 }),
            OverprovisionStrategy::Number | OverprovisionStrategy::Percentage if factor == 0 => {
                Err(ReconcileError::InvalidFactor { strategy, factor })
            }
            _ => Ok(Self { strategy, factor }),
        }
    }

    /// A policy that requests exactly the measured demand.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn strategy(&self) -> OverprovisionStrategy {
        self.strategy
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    /// Capacity to request for `demand` jobs, before clamping.
    pub fn target(&self, demand: u32) -> u32 {
        let demand = u64::from(demand);
        let factor = u64::from(self.factor);
        let target = match self.strategy {
            OverprovisionStrategy::None => demand,
            OverprovisionStrategy::Number => demand + factor,
            // ceil(demand * (1 + factor / 100)) without floating point
            OverprovisionStrategy::Percentage => demand + (demand * factor).div_ceil(100),
        };
        u32::try_from(target).unwrap_or(u32::MAX)
    }
}

/// A capacity decision for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Raise desired capacity to this value.
    ScaleTo(u32),
    /// Leave the group alone.
    NoChange,
}

/// Decide whether the fleet needs more capacity.
///
/// The target is clamped to `max_size` and only ever raises desired
/// capacity; scale-in is left to the provider.
pub fn desired_capacity(
    report: &OccupancyReport,
    policy: &OverprovisionPolicy,
    fleet: &FleetState,
) -> ScaleDecision {
    let target = policy.target(report.total());
    let desired = target.min(fleet.max_size);

    if desired > fleet.desired_capacity {
        ScaleDecision::ScaleTo(desired)
    } else {
        ScaleDecision::NoChange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fleet(desired: u32, max: u32) -> FleetState {
        FleetState {
            name: "agents-asg".to_string(),
            desired_capacity: desired,
            min_size: 0,
            max_size: max,
        }
    }

    fn demand(total: u32) -> OccupancyReport {
        OccupancyReport::new().with_count(STATE_QUEUED, total)
    }

    #[test]
    fn test_report_counts_states() {
        let report: OccupancyReport = ["QUEUED", "QUEUED", "RUNNING"].into_iter().collect();
        assert_eq!(report.count(STATE_QUEUED), 2);
        assert_eq!(report.count(STATE_RUNNING), 1);
        assert_eq!(report.total(), 3);
    }

    #[test]
    fn test_empty_report_has_default_states() {
        let report = OccupancyReport::new();
        let states: Vec<_> = report.iter().collect();
        assert_eq!(states, vec![(STATE_QUEUED, 0), (STATE_RUNNING, 0)]);
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("none".parse(), Ok(OverprovisionStrategy::None));
        assert_eq!("".parse(), Ok(OverprovisionStrategy::None));
        assert_eq!("Number".parse(), Ok(OverprovisionStrategy::Number));
        assert_eq!("percentage".parse(), Ok(OverprovisionStrategy::Percentage));
        assert_eq!(
            "linear".parse::<OverprovisionStrategy>(),
            Err(ReconcileError::UnknownStrategy("linear".to_string()))
        );
    }

    #[test]
    fn test_policy_requires_factor() {
        let err = OverprovisionPolicy::new(OverprovisionStrategy::Number, 0).unwrap_err();
        assert_eq!(err.reason_code(), "invalid_factor");
        assert!(OverprovisionPolicy::new(OverprovisionStrategy::Percentage, 0).is_err());
        assert!(OverprovisionPolicy::new(OverprovisionStrategy::None, 0).is_ok());
    }

    #[test]
    fn test_percentage_rounds_up() {
        let policy = OverprovisionPolicy::new(OverprovisionStrategy::Percentage, 50).unwrap();
        assert_eq!(policy.target(10), 15);
        assert_eq!(policy.target(3), 5);
        assert_eq!(policy.target(0), 0);
    }

    #[test]
    fn test_scale_up_from_mixed_demand() {
        let report = OccupancyReport::new()
            .with_count(STATE_QUEUED, 2)
            .with_count(STATE_RUNNING, 1);
        let decision = desired_capacity(&report, &OverprovisionPolicy::none(), &fleet(1, 10));
        assert_eq!(decision, ScaleDecision::ScaleTo(3));
    }

    #[test]
    fn test_demand_clamped_to_max_size() {
        let policies = [
            OverprovisionPolicy::none(),
            OverprovisionPolicy::new(OverprovisionStrategy::Number, 3).unwrap(),
            OverprovisionPolicy::new(OverprovisionStrategy::Percentage, 25).unwrap(),
        ];
        for policy in policies {
            let decision = desired_capacity(&demand(12), &policy, &fleet(2, 10));
            assert_eq!(decision, ScaleDecision::ScaleTo(10));
        }
    }

    #[test]
    fn test_no_change_when_capacity_is_enough() {
        let decision = desired_capacity(&demand(3), &OverprovisionPolicy::none(), &fleet(5, 10));
        assert_eq!(decision, ScaleDecision::NoChange);

        let decision = desired_capacity(&demand(5), &OverprovisionPolicy::none(), &fleet(5, 10));
        assert_eq!(decision, ScaleDecision::NoChange);
    }

    #[test]
    fn test_number_adds_fixed_headroom() {
        let policy = OverprovisionPolicy::new(OverprovisionStrategy::Number, 2).unwrap();
        let decision = desired_capacity(&demand(0), &policy, &fleet(0, 10));
        assert_eq!(decision, ScaleDecision::ScaleTo(2));
    }

    proptest! {
        #[test]
        fn prop_none_policy_is_clamped_demand(total in 0u32..1000, max in 0u32..1000) {
            let decision = desired_capacity(&demand(total), &OverprovisionPolicy::none(), &fleet(0, max));
            let expected = total.min(max);
            if expected > 0 {
                prop_assert_eq!(decision, ScaleDecision::ScaleTo(expected));
            } else {
                prop_assert_eq!(decision, ScaleDecision::NoChange);
            }
        }

        #[test]
        fn prop_percentage_matches_ceil(total in 0u32..10_000, factor in 1u32..500) {
            let policy = OverprovisionPolicy::new(OverprovisionStrategy::Percentage, factor).unwrap();
            let expected = (f64::from(total) * (1.0 + f64::from(factor) / 100.0) - 1e-9).ceil().max(0.0) as u32;
            prop_assert_eq!(policy.target(total), expected);
        }

        #[test]
        fn prop_never_scales_below_current(
            total in 0u32..1000,
            current in 0u32..1000,
            max in 0u32..1000,
            factor in 1u32..200,
        ) {
            let policy = OverprovisionPolicy::new(OverprovisionStrategy::Number, factor).unwrap();
            if let ScaleDecision::ScaleTo(n) = desired_capacity(&demand(total), &policy, &fleet(current, max)) {
                prop_assert!(n > current);
                prop_assert!(n <= max);
            }
        }
    }
}
