//! Tests for the invocation entry point with injected clients.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleet_agent_scaler::handler::invoke_with;
use fleet_agent_scaler::{
    CapacityController, Config, MockFleet, MockOccupancy, ScalerError, StaticToken,
};
use fleet_events::InvocationResponse;
use fleet_reconcile::{FleetState, OccupancyReport, STATE_QUEUED};
use tokio::time::Instant;

fn config() -> Result<Config, ScalerError> {
    Config::from_lookup(|name| match name {
        "SEMAPHORE_API_TOKEN_PARAMETER_NAME" => Some("agents-token".to_string()),
        "SEMAPHORE_AGENT_TYPE_NAME" => Some("s1-aws-small".to_string()),
        "SEMAPHORE_AGENT_ASG_NAME" => Some("agents-asg".to_string()),
        _ => None,
    })
}

struct Clients {
    occupancy: Arc<MockOccupancy>,
    fleet: Arc<MockFleet>,
    built: AtomicBool,
}

impl Clients {
    fn new() -> Self {
        Self {
            occupancy: Arc::new(MockOccupancy::new(
                OccupancyReport::new().with_count(STATE_QUEUED, 3),
            )),
            fleet: Arc::new(MockFleet::new(FleetState {
                name: "agents-asg".to_string(),
                desired_capacity: 1,
                min_size: 0,
                max_size: 10,
            })),
            built: AtomicBool::new(false),
        }
    }

    fn controller(&self, config: &Config) -> CapacityController {
        self.built.store(true, Ordering::SeqCst);
        CapacityController::new(
            config.fleet.clone(),
            config.policy,
            Arc::new(StaticToken::new("secret")),
            self.occupancy.clone(),
            self.fleet.clone(),
        )
        .with_schedule(config.schedule)
    }

    fn built(&self) -> bool {
        self.built.load(Ordering::SeqCst)
    }
}

#[tokio::test(start_paused = true)]
async fn test_missing_config_responds_without_clients() {
    let clients = Clients::new();
    let handle = &clients;
    let config = Config::from_lookup(|_| None);
    assert!(config.is_err());

    let response = invoke_with(config, Instant::now(), move |config| async move {
        Ok::<_, ScalerError>(handle.controller(&config))
    })
    .await;

    assert_eq!(response, InvocationResponse::error());
    assert!(!clients.built());
    assert!(clients.occupancy.tokens().await.is_empty());
    assert!(clients.fleet.set_calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_client_build_failure_responds_with_error() {
    let response = invoke_with(config(), Instant::now(), |_| async {
        Err::<CapacityController, _>(ScalerError::Token(
            "parameter store unreachable".to_string(),
        ))
    })
    .await;

    assert_eq!(response, InvocationResponse::error());
}

#[tokio::test(start_paused = true)]
async fn test_invocation_ticks_until_deadline() {
    let clients = Clients::new();
    let handle = &clients;

    let response = invoke_with(
        config(),
        Instant::now() + Duration::from_secs(25),
        move |config| async move { Ok::<_, ScalerError>(handle.controller(&config)) },
    )
    .await;

    assert_eq!(response, InvocationResponse::success());
    assert!(clients.built());
    // Ticks at 0s and 10s; a third would end past the deadline.
    assert_eq!(clients.occupancy.tokens().await.len(), 2);
    assert_eq!(
        clients.fleet.set_calls().await,
        vec![("agents-asg".to_string(), 3)]
    );
}
