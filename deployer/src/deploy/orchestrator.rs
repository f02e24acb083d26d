//! End-to-end deployment flow

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::info;

use crate::deploy::credentials::CredentialExporter;
use crate::deploy::poller::{Poller, PollerOptions};
use crate::deploy::reconciler::Reconciler;
use crate::deploy::traffic::TrafficRouter;
use crate::errors::DeployError;
use crate::models::credentials::{ClientConfig, EndpointCredentials};
use crate::models::deployment::{Deployment, DeploymentSpec};
use crate::models::endpoint::{Endpoint, EndpointSpec};
use crate::models::environment::EnvironmentSpec;
use crate::models::model::ModelRef;
use crate::models::traffic::TrafficTable;
use crate::platform::ServingPlatform;
use crate::session::context::SessionContext;

/// Desired serving topology for one run
#[derive(Debug, Clone)]
pub struct DeploymentPlan {
    /// Catalog name or raw identifier of the model
    pub model: String,
    pub environment: EnvironmentSpec,
    pub endpoint: EndpointSpec,
    pub deployment: DeploymentSpec,
}

/// What a successful run produced
#[derive(Debug)]
pub struct DeploymentOutcome {
    pub endpoint: Endpoint,
    pub deployment: Deployment,
    pub model: ModelRef,
    pub credentials: EndpointCredentials,
    pub client: ClientConfig,
    pub elapsed: Duration,
}

/// Runs model, environment, endpoint, deployment, traffic and keys in order
pub struct Orchestrator {
    reconciler: Reconciler,
    router: TrafficRouter,
    exporter: CredentialExporter,
}

impl Orchestrator {
    pub fn new(platform: Arc<dyn ServingPlatform>, options: PollerOptions) -> Self {
        let poller = Arc::new(Poller::new(platform.clone(), options));
        Self {
            reconciler: Reconciler::new(platform.clone(), poller.clone()),
            router: TrafficRouter::new(platform.clone(), poller),
            exporter: CredentialExporter::new(platform),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Deploy the plan and return what a client needs to call it
    pub async fn deploy(
        &self,
        session: &SessionContext,
        plan: &DeploymentPlan,
    ) -> Result<DeploymentOutcome, DeployError> {
        let start = Instant::now();
        info!(
            "Deploying '{}' to endpoint '{}' as '{}'",
            plan.model, plan.endpoint.name, plan.deployment.name
        );

        let model = self.reconciler.resolve_model(session, &plan.model).await?;
        let environment = self
            .reconciler
            .ensure_environment(session, &plan.environment)
            .await?;
        let endpoint = self.reconciler.ensure_endpoint(session, &plan.endpoint).await?;
        let healthy = self
            .reconciler
            .ensure_deployment(session, &endpoint, &plan.deployment, &model, &environment)
            .await?;

        let table = TrafficTable::single(healthy.name());
        let endpoint = self
            .router
            .set_traffic(session, &endpoint, &table, std::slice::from_ref(&healthy))
            .await?;

        let credentials = self.exporter.export_credentials(session, &endpoint).await?;
        // The serving image names the model after its MODEL_NAME variable
        let served_model = plan
            .deployment
            .environment_variables
            .get("MODEL_NAME")
            .cloned()
            .unwrap_or_else(|| plan.model.clone());
        let client = credentials.client_config(served_model);

        let elapsed = start.elapsed();
        info!(
            "Deployment '{}' is serving on '{}' ({}s)",
            healthy.name(),
            endpoint.name,
            elapsed.as_secs()
        );

        Ok(DeploymentOutcome {
            endpoint,
            deployment: healthy.into_inner(),
            model,
            credentials,
            client,
            elapsed,
        })
    }
}
