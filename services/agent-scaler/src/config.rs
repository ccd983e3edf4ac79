//! Configuration for the capacity controller.

use std::time::Duration;

use fleet_cloud::ClientTimeouts;
use fleet_reconcile::{
    OverprovisionPolicy, OverprovisionStrategy, TickSchedule, DEFAULT_TICK_BUDGET,
    DEFAULT_TICK_INTERVAL,
};

use crate::error::ScalerError;
use crate::fleet::FleetIdentity;

/// Default occupancy API host.
pub const DEFAULT_ENDPOINT: &str = "semaphore.semaphoreci.com";

/// Default CloudWatch namespace for occupancy metrics.
pub const DEFAULT_METRICS_NAMESPACE: &str = "Semaphore";

/// Capacity controller configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SSM parameter holding the occupancy API token.
    pub token_parameter_name: String,

    /// Agent (machine) type whose jobs count toward demand.
    pub agent_type: String,

    /// Which auto-scaling group to manage.
    pub fleet: FleetIdentity,

    /// Occupancy API base URL, without trailing slash.
    pub endpoint: String,

    /// Headroom requested above measured demand.
    pub policy: OverprovisionPolicy,

    /// Tick interval and worst-case tick duration.
    pub schedule: TickSchedule,

    /// Connect/response bounds for every outbound call.
    pub timeouts: ClientTimeouts,

    /// Whether to emit occupancy metrics.
    pub publish_metrics: bool,

    /// Metrics namespace.
    pub metrics_namespace: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ScalerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScalerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let token_parameter_name = get("SEMAPHORE_API_TOKEN_PARAMETER_NAME")
            .ok_or(ScalerError::MissingConfig("SEMAPHORE_API_TOKEN_PARAMETER_NAME"))?;

        let agent_type = get("SEMAPHORE_AGENT_TYPE_NAME")
            .ok_or(ScalerError::MissingConfig("SEMAPHORE_AGENT_TYPE_NAME"))?;

        let fleet = match (get("SEMAPHORE_AGENT_ASG_NAME"), get("SEMAPHORE_AGENT_STACK_NAME")) {
            (Some(name), _) => FleetIdentity::GroupName(name),
            (None, Some(stack)) => FleetIdentity::StackName(stack),
            (None, None) => return Err(ScalerError::MissingConfig("SEMAPHORE_AGENT_ASG_NAME")),
        };

        let endpoint = normalize_endpoint(
            &get("SEMAPHORE_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        );

        let strategy: OverprovisionStrategy = get("OVERPROVISION_STRATEGY")
            .unwrap_or_default()
            .parse()?;
        let factor = parse_or("OVERPROVISION_FACTOR", get("OVERPROVISION_FACTOR"), 0u32)?;
        let policy = OverprovisionPolicy::new(strategy, factor)?;

        let interval = parse_or(
            "SCALER_TICK_INTERVAL_SECS",
            get("SCALER_TICK_INTERVAL_SECS"),
            DEFAULT_TICK_INTERVAL.as_secs(),
        )?;

        let http_timeout = parse_or(
            "SCALER_HTTP_TIMEOUT_SECS",
            get("SCALER_HTTP_TIMEOUT_SECS"),
            ClientTimeouts::default().response.as_secs(),
        )?;
        let timeouts = ClientTimeouts::uniform(Duration::from_secs(http_timeout));

        // A tick is cut off at its budget, so the budget must fit at least
        // one full outbound call.
        let tick_budget = match get("SCALER_TICK_BUDGET_SECS") {
            None => timeouts.per_call().max(DEFAULT_TICK_BUDGET),
            Some(raw) => {
                let budget = Duration::from_secs(parse_or(
                    "SCALER_TICK_BUDGET_SECS",
                    Some(raw),
                    0u64,
                )?);
                if budget < timeouts.per_call() {
                    return Err(ScalerError::InvalidConfig {
                        name: "SCALER_TICK_BUDGET_SECS",
                        reason: format!(
                            "{}s is shorter than the {}s per-call timeout",
                            budget.as_secs(),
                            timeouts.per_call().as_secs()
                        ),
                    });
                }
                budget
            }
        };
        let schedule = TickSchedule::new(Duration::from_secs(interval), tick_budget);

        let publish_metrics = get("SCALER_PUBLISH_METRICS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let metrics_namespace = get("SCALER_METRICS_NAMESPACE")
            .unwrap_or_else(|| DEFAULT_METRICS_NAMESPACE.to_string());

        Ok(Self {
            token_parameter_name,
            agent_type,
            fleet,
            endpoint,
            policy,
            schedule,
            timeouts,
            publish_metrics,
            metrics_namespace,
        })
    }
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ScalerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ScalerError::InvalidConfig {
            name,
            reason: format!("'{}': {}", raw, e),
        }),
    }
}

/// Bare host names are served over HTTPS.
fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ScalerError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SEMAPHORE_API_TOKEN_PARAMETER_NAME", "agents-token"),
        ("SEMAPHORE_AGENT_TYPE_NAME", "s1-aws-small"),
        ("SEMAPHORE_AGENT_ASG_NAME", "agents-asg"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.fleet, FleetIdentity::GroupName("agents-asg".to_string()));
        assert_eq!(config.endpoint, "https://semaphore.semaphoreci.com");
        assert_eq!(config.policy, OverprovisionPolicy::none());
        assert_eq!(config.schedule, TickSchedule::default());
        assert_eq!(config.schedule.tick_budget, config.timeouts.per_call());
        assert!(!config.publish_metrics);
        assert_eq!(config.metrics_namespace, "Semaphore");
    }

    #[test]
    fn test_missing_token_parameter() {
        let err = load(&REQUIRED[1..]).unwrap_err();
        assert!(matches!(
            err,
            ScalerError::MissingConfig("SEMAPHORE_API_TOKEN_PARAMETER_NAME")
        ));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_missing_fleet_identity() {
        let err = load(&REQUIRED[..2]).unwrap_err();
        assert!(matches!(err, ScalerError::MissingConfig("SEMAPHORE_AGENT_ASG_NAME")));
    }

    #[test]
    fn test_stack_name_identity() {
        let mut vars = REQUIRED[..2].to_vec();
        vars.push(("SEMAPHORE_AGENT_STACK_NAME", "agents-stack"));
        let config = load(&vars).unwrap();
        assert_eq!(config.fleet, FleetIdentity::StackName("agents-stack".to_string()));
    }

    #[test]
    fn test_overprovision_policy() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("OVERPROVISION_STRATEGY", "percentage"));
        vars.push(("OVERPROVISION_FACTOR", "50"));
        let config = load(&vars).unwrap();
        assert_eq!(config.policy.strategy(), OverprovisionStrategy::Percentage);
        assert_eq!(config.policy.factor(), 50);
    }

    #[test]
    fn test_overprovision_without_factor_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("OVERPROVISION_STRATEGY", "number"));
        let err = load(&vars).unwrap_err();
        assert_eq!(err.reason_code(), "invalid_policy");
        assert!(err.is_config_error());
    }

    #[test]
    fn test_invalid_number() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("SCALER_TICK_INTERVAL_SECS", "ten"));
        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ScalerError::InvalidConfig {
                name: "SCALER_TICK_INTERVAL_SECS",
                ..
            }
        ));
    }

    #[test]
    fn test_tick_budget_follows_client_timeout() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("SCALER_HTTP_TIMEOUT_SECS", "8"));
        let config = load(&vars).unwrap();
        assert_eq!(config.schedule.tick_budget, Duration::from_secs(16));
    }

    #[test]
    fn test_tick_budget_shorter_than_call_is_rejected() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("SCALER_TICK_BUDGET_SECS", "5"));
        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ScalerError::InvalidConfig {
                name: "SCALER_TICK_BUDGET_SECS",
                ..
            }
        ));
        assert!(err.is_config_error());

        let mut vars = REQUIRED.to_vec();
        vars.push(("SCALER_TICK_BUDGET_SECS", "30"));
        let config = load(&vars).unwrap();
        assert_eq!(config.schedule.tick_budget, Duration::from_secs(30));
    }

    #[test]
    fn test_endpoint_normalization() {
        assert_eq!(normalize_endpoint("example.com/"), "https://example.com");
        assert_eq!(
            normalize_endpoint("http://127.0.0.1:8080"),
            "http://127.0.0.1:8080"
        );
    }
}
