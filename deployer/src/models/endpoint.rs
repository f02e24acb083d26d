//! Online endpoint models

use serde::{Deserialize, Serialize};

use crate::models::operation::ProvisioningState;
use crate::models::traffic::TrafficTable;

/// How callers authenticate against the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthMode {
    #[default]
    Key,
    #[serde(rename = "AMLToken")]
    AmlToken,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Key => "Key",
            AuthMode::AmlToken => "AMLToken",
        }
    }
}

/// Desired definition of an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub auth_mode: AuthMode,
}

/// An endpoint as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub location: String,
    pub auth_mode: AuthMode,
    pub description: Option<String>,
    /// Base scoring URI, available once the endpoint is provisioned
    pub scoring_uri: Option<String>,
    pub traffic: TrafficTable,
    pub provisioning_state: ProvisioningState,
}
