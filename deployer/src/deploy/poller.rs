//! Bounded polling of asynchronous provisioning operations

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::DeployError;
use crate::models::deployment::ProbePolicy;
use crate::models::operation::{OperationHandle, OperationStatus, ProbeOutcome, ResourceKind};
use crate::platform::ServingPlatform;
use crate::session::context::SessionContext;

/// Poller options
#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Delay between operation status queries
    pub interval: Duration,

    /// Budget for an environment create
    pub environment_timeout: Duration,

    /// Budget for an endpoint create or traffic update
    pub endpoint_timeout: Duration,

    /// Budget for a deployment create or update
    pub deployment_timeout: Duration,

    /// Budget for the readiness probe once provisioning succeeded
    pub readiness_timeout: Duration,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            environment_timeout: Duration::from_secs(30 * 60),
            endpoint_timeout: Duration::from_secs(20 * 60),
            deployment_timeout: Duration::from_secs(60 * 60),
            readiness_timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl PollerOptions {
    /// Budget for provisioning a resource of the given kind
    pub fn timeout_for(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Environment | ResourceKind::Model => self.environment_timeout,
            ResourceKind::Endpoint => self.endpoint_timeout,
            ResourceKind::Deployment => self.deployment_timeout,
        }
    }
}

/// An operation that reached `Succeeded`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalState {
    pub operation_id: String,
    /// Number of status queries issued
    pub polls: u32,
    pub elapsed: Duration,
}

/// A deployment whose readiness probe reached its success threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Probe cycles run, passing and failing
    pub cycles: u32,
    pub elapsed: Duration,
}

fn deadline(start: Instant, timeout: Duration) -> Result<Instant, DeployError> {
    start.checked_add(timeout).ok_or_else(|| {
        DeployError::ConfigError(format!("timeout of {}s is out of range", timeout.as_secs()))
    })
}

/// Drives accepted operations to a terminal state
pub struct Poller {
    platform: Arc<dyn ServingPlatform>,
    options: PollerOptions,
}

impl Poller {
    pub fn new(platform: Arc<dyn ServingPlatform>, options: PollerOptions) -> Self {
        Self { platform, options }
    }

    pub fn options(&self) -> &PollerOptions {
        &self.options
    }

    /// Wait until the operation succeeds, fails, or `timeout` elapses
    ///
    /// Status is re-queried on every cycle. A zero timeout issues exactly one
    /// query.
    pub async fn await_terminal(
        &self,
        session: &SessionContext,
        operation: &OperationHandle,
        timeout: Duration,
    ) -> Result<TerminalState, DeployError> {
        info!(
            kind = %operation.kind,
            name = %operation.name,
            timeout_secs = timeout.as_secs(),
            "Waiting for operation to complete"
        );

        let start = Instant::now();
        let deadline = deadline(start, timeout)?;
        let mut polls = 0u32;

        loop {
            let status = self.platform.operation_status(session, operation).await?;
            polls += 1;

            debug!(
                kind = %operation.kind,
                name = %operation.name,
                status = ?status,
                elapsed_secs = start.elapsed().as_secs(),
                "Polling operation status"
            );

            match status {
                OperationStatus::Succeeded => {
                    info!(kind = %operation.kind, name = %operation.name, polls, "Operation succeeded");
                    return Ok(TerminalState {
                        operation_id: operation.id.clone(),
                        polls,
                        elapsed: start.elapsed(),
                    });
                }
                OperationStatus::Failed(diagnostic) | OperationStatus::Canceled(diagnostic) => {
                    return Err(DeployError::ProvisioningFailed {
                        kind: operation.kind,
                        name: operation.name.clone(),
                        diagnostic,
                    });
                }
                OperationStatus::InProgress => {}
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(kind = %operation.kind, name = %operation.name, polls, "Operation timed out");
                return Err(DeployError::ProvisioningTimedOut {
                    kind: operation.kind,
                    name: operation.name.clone(),
                    timeout,
                });
            }

            tokio::time::sleep(self.options.interval.min(deadline - now)).await;
        }
    }

    /// Probe readiness until `policy.success_threshold` consecutive passes
    pub async fn await_ready(
        &self,
        session: &SessionContext,
        endpoint: &str,
        deployment: &str,
        policy: &ProbePolicy,
        timeout: Duration,
    ) -> Result<ReadinessReport, DeployError> {
        info!(endpoint, deployment, "Waiting for readiness probe");

        let start = Instant::now();
        let deadline = deadline(start, timeout)?;
        let success_threshold = policy.success_threshold.max(1);
        let failure_threshold = policy.failure_threshold.max(1);
        let mut cycles = 0u32;
        let mut passes = 0u32;
        let mut failures = 0u32;

        loop {
            let outcome = self
                .platform
                .probe_readiness(session, endpoint, deployment)
                .await?;
            cycles += 1;

            match outcome {
                ProbeOutcome::Pass => {
                    passes += 1;
                    failures = 0;
                    debug!(deployment, passes, success_threshold, "Readiness probe passed");
                    if passes >= success_threshold {
                        info!(deployment, cycles, "Deployment is ready");
                        return Ok(ReadinessReport {
                            cycles,
                            elapsed: start.elapsed(),
                        });
                    }
                }
                ProbeOutcome::Fail(reason) => {
                    failures += 1;
                    passes = 0;
                    debug!(deployment, failures, failure_threshold, reason = %reason, "Readiness probe failed");
                    if failures >= failure_threshold {
                        return Err(DeployError::ProvisioningFailed {
                            kind: ResourceKind::Deployment,
                            name: deployment.to_string(),
                            diagnostic: format!(
                                "readiness probe failed {} consecutive times, last result: {}",
                                failures, reason
                            ),
                        });
                    }
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(DeployError::ProvisioningTimedOut {
                    kind: ResourceKind::Deployment,
                    name: deployment.to_string(),
                    timeout,
                });
            }

            tokio::time::sleep(policy.period.min(deadline - now)).await;
        }
    }
}
