//! Invocation entry point shared by the Lambda and local runners.

use std::future::Future;
use std::sync::Arc;

use fleet_cloud::load_sdk_config;
use fleet_events::{InvocationResponse, LifecycleEvent};
use tracing::{debug, error, info};

use crate::command::SsmCommands;
use crate::config::Config;
use crate::error::StarterError;
use crate::instance::SsmInstanceStatus;
use crate::lifecycle::AutoScalingLifecycle;
use crate::starter::{LifecycleStarter, StartSettings};

/// Handle one raw lifecycle event payload with clients built from the
/// environment.
pub async fn invoke(payload: serde_json::Value) -> InvocationResponse {
    invoke_with(Config::from_env(), payload, |config, region| async move {
        build_starter(&config, region.as_deref()).await
    })
    .await
}

/// Handle one raw lifecycle event payload.
///
/// Responds with an error when `config` is an error, the payload cannot be
/// decoded, or the hook could not be resolved. `build` is only called once
/// both configuration and event are valid.
pub async fn invoke_with<F, Fut>(
    config: Result<Config, StarterError>,
    payload: serde_json::Value,
    build: F,
) -> InvocationResponse
where
    F: FnOnce(Config, Option<String>) -> Fut,
    Fut: Future<Output = LifecycleStarter>,
{
    debug!(event = %payload, "Received event");

    let (config, event) = match prepare(config, payload) {
        Ok(prepared) => prepared,
        Err(e) if e.is_config_error() => {
            error!(error = %e, reason = e.reason_code(), "Invalid configuration");
            return InvocationResponse::error();
        }
        Err(e) => {
            error!(error = %e, reason = e.reason_code(), "Invalid lifecycle event");
            return InvocationResponse::error();
        }
    };

    let starter = build(config, event.region.clone()).await;

    match starter.handle(&event).await {
        Ok(report) => {
            info!(
                instance_id = %event.instance_id(),
                result = %report.result,
                instance_attempts = report.instance_attempts,
                "Lifecycle event handled"
            );
            InvocationResponse::success()
        }
        Err(e) => {
            error!(
                instance_id = %event.instance_id(),
                error = %e,
                reason = e.reason_code(),
                "Lifecycle event failed"
            );
            InvocationResponse::error()
        }
    }
}

fn prepare(
    config: Result<Config, StarterError>,
    payload: serde_json::Value,
) -> Result<(Config, LifecycleEvent), StarterError> {
    let config = config?;
    let event = LifecycleEvent::from_value(payload)?;
    Ok((config, event))
}

/// Wire the AWS clients described by `config`.
///
/// The lifecycle client targets `event_region` when given.
pub async fn build_starter(config: &Config, event_region: Option<&str>) -> LifecycleStarter {
    let sdk_config = load_sdk_config(config.timeouts, None).await;
    let lifecycle_config = match event_region {
        Some(region) => load_sdk_config(config.timeouts, Some(region)).await,
        None => sdk_config.clone(),
    };

    let ssm = aws_sdk_ssm::Client::new(&sdk_config);

    LifecycleStarter::new(
        Arc::new(SsmInstanceStatus::new(ssm.clone())),
        Arc::new(SsmCommands::new(ssm)),
        Arc::new(AutoScalingLifecycle::new(aws_sdk_autoscaling::Client::new(
            &lifecycle_config,
        ))),
        StartSettings::from(config),
    )
}
