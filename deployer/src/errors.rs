//! Error types for the deployer

use std::time::Duration;

use thiserror::Error;

use crate::models::operation::ResourceKind;
use crate::platform::PlatformError;

/// Main error type for a deployment run
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Lookup of {kind} '{name}' failed: {source}")]
    ResourceLookupFailed {
        kind: ResourceKind,
        name: String,
        #[source]
        source: PlatformError,
    },

    #[error("Provisioning of {kind} '{name}' failed. Detailed response:\n{diagnostic}")]
    ProvisioningFailed {
        kind: ResourceKind,
        name: String,
        diagnostic: String,
    },

    #[error("Provisioning of {kind} '{name}' did not finish within {timeout:?}")]
    ProvisioningTimedOut {
        kind: ResourceKind,
        name: String,
        timeout: Duration,
    },

    #[error("Invalid traffic table: {0}")]
    InvalidTrafficTable(String),

    #[error("Model '{0}' is not registered in the workspace")]
    ModelNotRegistered(String),

    #[error("Deployment '{0}' has not passed its readiness probe")]
    DeploymentNotHealthy(String),

    #[error("Invalid deployment transition: {0}")]
    InvalidTransition(String),

    #[error("Platform error: {0}")]
    Platform(PlatformError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Chat error: {0}")]
    ChatError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Interrupted before the run completed")]
    Interrupted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl DeployError {
    /// Whether re-running the whole reconciliation is the expected recovery
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeployError::ProvisioningTimedOut { .. })
    }
}

impl From<PlatformError> for DeployError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Unauthorized(message) => DeployError::AuthenticationFailed(message),
            other => DeployError::Platform(other),
        }
    }
}
