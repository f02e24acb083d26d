//! Finite State Machine for deployment provisioning

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;
use crate::models::deployment::Deployment;

/// Deployment state within one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentState {
    /// Nothing submitted yet
    Absent,

    /// Create or update call issued, not yet accepted
    Creating,

    /// Accepted by the platform, waiting for a terminal status and readiness
    Provisioning,

    /// Provisioned and passing its readiness probe
    Healthy,

    /// Rejected, failed, or never became ready
    Failed,

    /// Gave up waiting
    TimedOut,
}

/// Deployment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// Create or update call issued
    Submit,

    /// Platform returned an operation handle
    Accepted,

    /// Platform refused the call
    Rejected(String),

    /// Operation succeeded and readiness reached its success threshold
    Ready,

    /// Operation reached a failed terminal status
    ProvisioningFailed(String),

    /// Readiness probe reached its failure threshold
    ProbeFailed(String),

    /// Poller deadline passed
    TimedOut,
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentState,
    error: Option<String>,
    attempts: u32,
}

impl DeploymentFsm {
    /// Create a new FSM in absent state
    pub fn new() -> Self {
        Self {
            state: DeploymentState::Absent,
            error: None,
            attempts: 0,
        }
    }

    /// Get current state
    pub fn state(&self) -> &DeploymentState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Number of submitted create or update calls
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_healthy(&self) -> bool {
        self.state == DeploymentState::Healthy
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            // Submitting is allowed from any resting state
            (
                DeploymentState::Absent
                | DeploymentState::Healthy
                | DeploymentState::Failed
                | DeploymentState::TimedOut,
                DeploymentEvent::Submit,
            ) => {
                self.error = None;
                self.attempts += 1;
                DeploymentState::Creating
            }

            // From Creating
            (DeploymentState::Creating, DeploymentEvent::Accepted) => DeploymentState::Provisioning,
            (DeploymentState::Creating, DeploymentEvent::Rejected(err)) => {
                self.error = Some(err.clone());
                DeploymentState::Failed
            }

            // From Provisioning
            (DeploymentState::Provisioning, DeploymentEvent::Ready) => DeploymentState::Healthy,
            (
                DeploymentState::Provisioning,
                DeploymentEvent::ProvisioningFailed(err) | DeploymentEvent::ProbeFailed(err),
            ) => {
                self.error = Some(err.clone());
                DeploymentState::Failed
            }
            (DeploymentState::Provisioning, DeploymentEvent::TimedOut) => {
                self.error = Some("timed out waiting for provisioning".to_string());
                DeploymentState::TimedOut
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Vouch for a deployment that this machine has driven to `Healthy`
    pub fn certify(&self, deployment: Deployment) -> Result<HealthyDeployment, DeployError> {
        if self.state != DeploymentState::Healthy {
            return Err(DeployError::DeploymentNotHealthy(format!(
                "{} (state: {:?})",
                deployment.name, self.state
            )));
        }
        Ok(HealthyDeployment { deployment })
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}

/// A deployment that has passed provisioning and its readiness probe
///
/// Only obtainable through [`DeploymentFsm::certify`], so holding one is
/// proof that traffic may be routed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthyDeployment {
    deployment: Deployment,
}

impl HealthyDeployment {
    pub fn name(&self) -> &str {
        &self.deployment.name
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn into_inner(self) -> Deployment {
        self.deployment
    }
}
