//! Endpoint traffic routing

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::info;

use crate::deploy::fsm::HealthyDeployment;
use crate::deploy::poller::Poller;
use crate::deploy::reconciler::lookup_failed;
use crate::errors::DeployError;
use crate::models::endpoint::Endpoint;
use crate::models::operation::ResourceKind;
use crate::models::traffic::TrafficTable;
use crate::platform::{Lookup, PlatformError, ServingPlatform};
use crate::session::context::SessionContext;

pub struct TrafficRouter {
    platform: Arc<dyn ServingPlatform>,
    poller: Arc<Poller>,
}

impl TrafficRouter {
    pub fn new(platform: Arc<dyn ServingPlatform>, poller: Arc<Poller>) -> Self {
        Self { platform, poller }
    }

    /// Check a table against the deployments known to be healthy
    ///
    /// Zero-weight entries may name any deployment.
    pub fn check(table: &TrafficTable, healthy: &[HealthyDeployment]) -> Result<(), DeployError> {
        table.validate()?;

        let names: BTreeSet<&str> = healthy.iter().map(HealthyDeployment::name).collect();
        for (deployment, weight) in table.weighted() {
            if !names.contains(deployment) {
                return Err(DeployError::DeploymentNotHealthy(format!(
                    "{} (weight {})",
                    deployment, weight
                )));
            }
        }
        Ok(())
    }

    /// Apply the traffic table to the endpoint
    pub async fn set_traffic(
        &self,
        session: &SessionContext,
        endpoint: &Endpoint,
        table: &TrafficTable,
        healthy: &[HealthyDeployment],
    ) -> Result<Endpoint, DeployError> {
        Self::check(table, healthy)?;

        info!("Routing traffic on endpoint '{}': {:?}", endpoint.name, table);
        let accepted = self.platform.update_traffic(session, endpoint, table).await?;
        self.poller
            .await_terminal(
                session,
                &accepted.operation,
                self.poller.options().endpoint_timeout,
            )
            .await?;

        match self.platform.get_endpoint(session, &endpoint.name).await {
            Lookup::Found(updated) => {
                info!("Traffic updated for endpoint '{}'.", updated.name);
                Ok(updated)
            }
            Lookup::NotFound => Err(lookup_failed(
                ResourceKind::Endpoint,
                &endpoint.name,
                PlatformError::NotFound(format!(
                    "endpoint '{}' vanished after traffic update",
                    endpoint.name
                )),
            )),
            Lookup::Failed(err) => Err(lookup_failed(ResourceKind::Endpoint, &endpoint.name, err)),
        }
    }
}
