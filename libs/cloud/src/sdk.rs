//! AWS SDK configuration.

use std::time::Duration;

use aws_config::retry::RetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::debug;

/// Connect and response timeouts applied to every outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    pub connect: Duration,
    pub response: Duration,
}

impl ClientTimeouts {
    /// Use the same bound for connect and response.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            connect: timeout,
            response: timeout,
        }
    }

    /// Worst case for a single call: connect plus response.
    pub fn per_call(&self) -> Duration {
        self.connect + self.response
    }
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(5))
    }
}

/// Load the shared SDK configuration.
///
/// Retries are disabled: the next tick or poll iteration is the retry.
pub async fn load_sdk_config(timeouts: ClientTimeouts, region: Option<&str>) -> SdkConfig {
    debug!(
        connect_ms = timeouts.connect.as_millis() as u64,
        response_ms = timeouts.response.as_millis() as u64,
        region = region.unwrap_or("default"),
        "Loading AWS SDK configuration"
    );

    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(timeouts.connect)
        .read_timeout(timeouts.response)
        .operation_timeout(timeouts.per_call())
        .build();

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .timeout_config(timeout_config)
        .retry_config(RetryConfig::disabled());

    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }

    loader.load().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_call_bound() {
        let timeouts = ClientTimeouts {
            connect: Duration::from_secs(1),
            response: Duration::from_secs(4),
        };
        assert_eq!(timeouts.per_call(), Duration::from_secs(5));
        assert_eq!(
            ClientTimeouts::default(),
            ClientTimeouts::uniform(Duration::from_secs(5))
        );
    }
}
