//! Deployment models

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::operation::ProvisioningState;

/// Backpressure limits applied per serving instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLimits {
    /// Requests handled concurrently by one instance
    pub max_concurrent_requests_per_instance: u32,

    /// Time allowed for a single scoring request
    pub request_timeout: Duration,

    /// Time a request may wait in the queue before being rejected
    pub max_queue_wait: Duration,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_concurrent_requests_per_instance: 2,
            request_timeout: Duration::from_millis(20_000),
            max_queue_wait: Duration::from_millis(60_000),
        }
    }
}

/// Health probe policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbePolicy {
    /// Consecutive failures before the probe is considered failed
    pub failure_threshold: u32,

    /// Consecutive passes before the probe is considered passing
    pub success_threshold: u32,

    /// Time allowed for one probe
    pub timeout: Duration,

    /// Time between probes
    pub period: Duration,

    /// Delay before the first probe
    pub initial_delay: Duration,
}

impl ProbePolicy {
    pub fn liveness() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            timeout: Duration::from_secs(10),
            period: Duration::from_secs(30),
            initial_delay: Duration::from_secs(120),
        }
    }

    pub fn readiness() -> Self {
        Self {
            failure_threshold: 30,
            success_threshold: 1,
            timeout: Duration::from_secs(2),
            period: Duration::from_secs(10),
            initial_delay: Duration::from_secs(120),
        }
    }
}

/// Desired definition of a deployment behind an endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub name: String,

    /// Machine SKU for every instance
    pub instance_type: String,

    pub instance_count: u32,

    pub environment_variables: BTreeMap<String, String>,

    pub request_limits: RequestLimits,

    pub liveness_probe: ProbePolicy,

    pub readiness_probe: ProbePolicy,
}

/// A deployment as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    pub endpoint_name: String,
    /// Model reference the deployment serves
    pub model: String,
    /// Environment asset id the deployment runs
    pub environment: String,
    pub instance_type: String,
    pub instance_count: u32,
    pub provisioning_state: ProvisioningState,
}
