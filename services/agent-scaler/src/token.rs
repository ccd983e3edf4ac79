//! Occupancy API token lookup.

use async_trait::async_trait;
use aws_sdk_ssm::error::DisplayErrorContext;
use tracing::debug;

use crate::error::ScalerError;

/// Source of the occupancy API token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn api_token(&self) -> Result<String, ScalerError>;
}

/// Reads the token from an SSM SecureString parameter.
///
/// The parameter is read on every call so a rotated token is picked up on
/// the next tick.
pub struct SsmTokenSource {
    client: aws_sdk_ssm::Client,
    parameter_name: String,
}

impl SsmTokenSource {
    pub fn new(client: aws_sdk_ssm::Client, parameter_name: impl Into<String>) -> Self {
        Self {
            client,
            parameter_name: parameter_name.into(),
        }
    }
}

#[async_trait]
impl TokenSource for SsmTokenSource {
    async fn api_token(&self) -> Result<String, ScalerError> {
        debug!(parameter = %self.parameter_name, "Fetching API token");

        let output = self
            .client
            .get_parameter()
            .name(&self.parameter_name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| ScalerError::Token(DisplayErrorContext(&e).to_string()))?;

        output
            .parameter()
            .and_then(|p| p.value())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ScalerError::Token(format!("parameter '{}' has no value", self.parameter_name))
            })
    }
}

/// A fixed token.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn api_token(&self) -> Result<String, ScalerError> {
        Ok(self.0.clone())
    }
}
