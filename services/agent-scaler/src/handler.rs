//! Invocation entry point shared by the Lambda and local runners.

use std::future::Future;
use std::sync::Arc;

use fleet_cloud::load_sdk_config;
use fleet_events::InvocationResponse;
use tokio::time::Instant;
use tracing::{error, info};

use crate::config::Config;
use crate::controller::CapacityController;
use crate::error::ScalerError;
use crate::fleet::AutoScalingFleet;
use crate::metrics::EmfMetrics;
use crate::occupancy::OccupancyClient;
use crate::token::SsmTokenSource;

/// Run one invocation with clients built from the environment.
pub async fn invoke(deadline: Instant) -> InvocationResponse {
    invoke_with(Config::from_env(), deadline, |config| async move {
        build_controller(&config).await
    })
    .await
}

/// Run one invocation: check `config`, build the controller, then tick until
/// `deadline`.
///
/// Only configuration and client construction problems produce an error
/// response; failed ticks are absorbed by the controller. `build` is not
/// called when `config` is an error.
pub async fn invoke_with<F, Fut>(
    config: Result<Config, ScalerError>,
    deadline: Instant,
    build: F,
) -> InvocationResponse
where
    F: FnOnce(Config) -> Fut,
    Fut: Future<Output = Result<CapacityController, ScalerError>>,
{
    let controller = match prepare(config, build).await {
        Ok(controller) => controller,
        Err(e) if e.is_config_error() => {
            error!(error = %e, reason = e.reason_code(), "Invalid configuration");
            return InvocationResponse::error();
        }
        Err(e) => {
            error!(error = %e, reason = e.reason_code(), "Failed to build clients");
            return InvocationResponse::error();
        }
    };

    let summary = controller.run(deadline).await;
    info!(
        ticks = summary.ticks,
        failed_ticks = summary.failed_ticks,
        scale_ups = summary.scale_ups,
        "Capacity controller finished"
    );

    InvocationResponse::success()
}

async fn prepare<F, Fut>(
    config: Result<Config, ScalerError>,
    build: F,
) -> Result<CapacityController, ScalerError>
where
    F: FnOnce(Config) -> Fut,
    Fut: Future<Output = Result<CapacityController, ScalerError>>,
{
    let config = config?;
    info!(
        fleet = %config.fleet,
        agent_type = %config.agent_type,
        endpoint = %config.endpoint,
        strategy = %config.policy.strategy(),
        factor = config.policy.factor(),
        "Configuration loaded"
    );
    build(config).await
}

/// Wire the AWS and HTTP clients described by `config`.
pub async fn build_controller(config: &Config) -> Result<CapacityController, ScalerError> {
    let sdk_config = load_sdk_config(config.timeouts, None).await;

    let tokens = SsmTokenSource::new(
        aws_sdk_ssm::Client::new(&sdk_config),
        config.token_parameter_name.clone(),
    );
    let occupancy = OccupancyClient::new(&config.endpoint, &config.agent_type, config.timeouts)?;
    let fleet = AutoScalingFleet::new(aws_sdk_autoscaling::Client::new(&sdk_config));

    let mut controller = CapacityController::new(
        config.fleet.clone(),
        config.policy,
        Arc::new(tokens),
        Arc::new(occupancy),
        Arc::new(fleet),
    )
    .with_schedule(config.schedule);

    if config.publish_metrics {
        controller = controller.with_metrics(Arc::new(EmfMetrics::new(
            config.metrics_namespace.clone(),
        )));
    }

    Ok(controller)
}
