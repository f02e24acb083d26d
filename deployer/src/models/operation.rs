//! Asynchronous platform operations

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of remote resource managed by the deployer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Model,
    Environment,
    Endpoint,
    Deployment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => write!(f, "model"),
            Self::Environment => write!(f, "environment"),
            Self::Endpoint => write!(f, "endpoint"),
            Self::Deployment => write!(f, "deployment"),
        }
    }
}

/// Provisioning state reported by the platform for a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProvisioningState {
    Creating,
    Updating,
    Succeeded,
    Failed,
    Canceled,
    Deleting,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ProvisioningState {
    /// Parse the platform's state string, case-insensitively
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "creating" => Self::Creating,
            "updating" | "scaling" => Self::Updating,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            "deleting" => Self::Deleting,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Updating => write!(f, "updating"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Canceled => write!(f, "canceled"),
            Self::Deleting => write!(f, "deleting"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Pull-based reference to an operation accepted by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle {
    /// Operation identifier, unique per accepted call
    pub id: String,

    /// Kind of resource being provisioned
    pub kind: ResourceKind,

    /// Name of the resource being provisioned
    pub name: String,

    /// URL to query for status. `None` when the platform completed the
    /// call synchronously.
    pub status_url: Option<String>,
}

impl OperationHandle {
    /// Handle for a call the platform finished before responding
    pub fn completed(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            name: name.into(),
            status_url: None,
        }
    }

    /// Handle for a call still running on the platform
    pub fn pending(kind: ResourceKind, name: impl Into<String>, status_url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            name: name.into(),
            status_url: Some(status_url.into()),
        }
    }
}

/// Current status of an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    /// Failed with the platform's diagnostic payload, verbatim
    Failed(String),
    Canceled(String),
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::InProgress)
    }
}

/// A create or update call accepted by the platform
#[derive(Debug, Clone)]
pub struct Accepted<T> {
    /// Resource as reported when the call was accepted
    pub resource: T,

    /// Handle to poll until the operation is terminal
    pub operation: OperationHandle,
}

/// Result of one readiness probe cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Pass,
    Fail(String),
}
