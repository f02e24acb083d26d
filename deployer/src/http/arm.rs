//! Resource Manager request and response bodies

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Workspace and models
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WorkspaceResource {
    pub location: String,
}

/// Model container; versions live beneath it
#[derive(Debug, Clone, Deserialize)]
pub struct ModelContainerResource {
    pub id: String,
    pub name: String,
    pub properties: ModelContainerProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelContainerProperties {
    #[serde(default)]
    pub latest_version: Option<String>,
}

// ============================================================================
// Environments
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentVersionResource {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default, skip_serializing)]
    pub name: String,
    pub properties: EnvironmentVersionProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVersionProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildContextBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference_config: Option<InferenceConfigBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildContextBody {
    pub context_uri: String,
    pub dockerfile_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfigBody {
    pub liveness_route: RouteBody,
    pub readiness_route: RouteBody,
    pub scoring_route: RouteBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteBody {
    pub path: String,
    pub port: u16,
}

// ============================================================================
// Online endpoints
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineEndpointResource {
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    pub properties: OnlineEndpointProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineEndpointProperties {
    pub auth_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic: Option<BTreeMap<String, u32>>,
    #[serde(default, skip_serializing)]
    pub scoring_uri: Option<String>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointKeysBody {
    pub primary_key: String,
    pub secondary_key: String,
}

// ============================================================================
// Online deployments
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnlineDeploymentResource {
    #[serde(default, skip_serializing)]
    pub name: String,
    pub location: String,
    pub sku: SkuBody,
    pub properties: OnlineDeploymentProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkuBody {
    pub name: String,
    pub capacity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineDeploymentProperties {
    pub endpoint_compute_type: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub environment_id: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub environment_variables: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_settings: Option<RequestSettingsBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liveness_probe: Option<ProbeSettingsBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_probe: Option<ProbeSettingsBody>,
    #[serde(default, skip_serializing)]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSettingsBody {
    pub max_concurrent_requests_per_instance: u32,
    pub request_timeout: String,
    pub max_queue_wait: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSettingsBody {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: String,
    pub period: String,
    pub initial_delay: String,
}

// ============================================================================
// Async operations
// ============================================================================

/// Body returned by an `Azure-AsyncOperation` URL
#[derive(Debug, Clone, Deserialize)]
pub struct AsyncOperationBody {
    pub status: String,
}

/// Format a duration as an ISO 8601 duration (`PT20S`, `PT0.5S`)
pub fn iso8601(duration: Duration) -> String {
    let millis = duration.subsec_millis();
    if millis == 0 {
        format!("PT{}S", duration.as_secs())
    } else {
        let fraction = format!("{:03}", millis);
        format!("PT{}.{}S", duration.as_secs(), fraction.trim_end_matches('0'))
    }
}
