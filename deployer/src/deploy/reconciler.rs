//! Idempotent get-or-create of serving resources

use std::sync::Arc;

use tracing::{info, warn};

use crate::deploy::fsm::{DeploymentEvent, DeploymentFsm, HealthyDeployment};
use crate::deploy::poller::Poller;
use crate::errors::DeployError;
use crate::models::deployment::{Deployment, DeploymentSpec};
use crate::models::endpoint::{Endpoint, EndpointSpec};
use crate::models::environment::{Environment, EnvironmentSpec};
use crate::models::model::ModelRef;
use crate::models::operation::ResourceKind;
use crate::platform::{Lookup, PlatformError, ServingPlatform};
use crate::session::context::SessionContext;

/// Brings the model, environment, endpoint and deployment into existence
pub struct Reconciler {
    platform: Arc<dyn ServingPlatform>,
    poller: Arc<Poller>,
}

impl Reconciler {
    pub fn new(platform: Arc<dyn ServingPlatform>, poller: Arc<Poller>) -> Self {
        Self { platform, poller }
    }

    /// Resolve the model from the catalog, falling back to the raw identifier
    pub async fn resolve_model(
        &self,
        session: &SessionContext,
        name: &str,
    ) -> Result<ModelRef, DeployError> {
        match self.platform.get_model(session, name).await {
            Lookup::Found(model) => {
                info!("Retrieved model: {} (version {})", model.name, model.version);
                Ok(ModelRef::Registered(model))
            }
            Lookup::NotFound => {
                let recovered = DeployError::ModelNotRegistered(name.to_string());
                warn!(
                    "{}; deploying with the raw identifier, which is not validated against the catalog",
                    recovered
                );
                Ok(ModelRef::identifier(name))
            }
            Lookup::Failed(err) => Err(lookup_failed(ResourceKind::Model, name, err)),
        }
    }

    /// Reuse the environment version if it exists, otherwise create it
    pub async fn ensure_environment(
        &self,
        session: &SessionContext,
        spec: &EnvironmentSpec,
    ) -> Result<Environment, DeployError> {
        spec.inference.validate()?;

        match self
            .platform
            .get_environment(session, &spec.name, &spec.version)
            .await
        {
            Lookup::Found(environment) => {
                info!(
                    "Environment '{}' version {} already exists. Using existing environment.",
                    environment.name, environment.version
                );
                Ok(environment)
            }
            Lookup::NotFound => {
                info!(
                    "Environment '{}' version {} not found. Creating a new environment.",
                    spec.name, spec.version
                );
                let accepted = self.platform.create_environment(session, spec).await?;
                self.poller
                    .await_terminal(
                        session,
                        &accepted.operation,
                        self.poller.options().environment_timeout,
                    )
                    .await?;
                info!("Environment '{}' registered successfully.", accepted.resource.name);
                Ok(accepted.resource)
            }
            Lookup::Failed(err) => Err(lookup_failed(ResourceKind::Environment, &spec.name, err)),
        }
    }

    /// Reuse the endpoint if it exists, otherwise create it
    pub async fn ensure_endpoint(
        &self,
        session: &SessionContext,
        spec: &EndpointSpec,
    ) -> Result<Endpoint, DeployError> {
        match self.platform.get_endpoint(session, &spec.name).await {
            Lookup::Found(endpoint) => {
                info!("Endpoint '{}' already exists. Using existing endpoint.", spec.name);
                Ok(endpoint)
            }
            Lookup::NotFound => {
                info!("Endpoint '{}' not found. Creating a new endpoint.", spec.name);
                let accepted = self.platform.create_endpoint(session, spec).await?;
                self.poller
                    .await_terminal(
                        session,
                        &accepted.operation,
                        self.poller.options().endpoint_timeout,
                    )
                    .await?;
                let endpoint = self.fetch_endpoint(session, &spec.name).await?;
                info!("Endpoint '{}' created successfully.", spec.name);
                Ok(endpoint)
            }
            Lookup::Failed(err) => Err(lookup_failed(ResourceKind::Endpoint, &spec.name, err)),
        }
    }

    /// Create or update the deployment and wait until it is healthy
    ///
    /// An existing deployment is always updated, since sizing, variables and
    /// probes are expected to change between runs.
    pub async fn ensure_deployment(
        &self,
        session: &SessionContext,
        endpoint: &Endpoint,
        spec: &DeploymentSpec,
        model: &ModelRef,
        environment: &Environment,
    ) -> Result<HealthyDeployment, DeployError> {
        match self
            .platform
            .get_deployment(session, &endpoint.name, &spec.name)
            .await
        {
            Lookup::Found(existing) => info!(
                "Deployment '{}' exists ({}). Updating in place.",
                existing.name, existing.provisioning_state
            ),
            Lookup::NotFound => info!("Deployment '{}' not found. Creating.", spec.name),
            Lookup::Failed(err) => {
                return Err(lookup_failed(ResourceKind::Deployment, &spec.name, err))
            }
        }

        let mut fsm = DeploymentFsm::new();
        transition(&mut fsm, DeploymentEvent::Submit)?;

        let accepted = match self
            .platform
            .create_or_update_deployment(session, endpoint, spec, model, environment)
            .await
        {
            Ok(accepted) => accepted,
            Err(err) => {
                transition(&mut fsm, DeploymentEvent::Rejected(err.to_string()))?;
                return Err(err.into());
            }
        };
        transition(&mut fsm, DeploymentEvent::Accepted)?;

        let provisioned = self
            .poller
            .await_terminal(
                session,
                &accepted.operation,
                self.poller.options().deployment_timeout,
            )
            .await;
        if let Err(err) = provisioned {
            transition(&mut fsm, failure_event(&err))?;
            return Err(err);
        }

        let ready = self
            .poller
            .await_ready(
                session,
                &endpoint.name,
                &spec.name,
                &spec.readiness_probe,
                self.poller.options().readiness_timeout,
            )
            .await;
        match ready {
            Ok(report) => {
                info!(
                    "Deployment '{}' passed readiness after {} probe cycles.",
                    spec.name, report.cycles
                );
                transition(&mut fsm, DeploymentEvent::Ready)?;
            }
            Err(err) => {
                let event = match &err {
                    DeployError::ProvisioningFailed { diagnostic, .. } => {
                        DeploymentEvent::ProbeFailed(diagnostic.clone())
                    }
                    other => failure_event(other),
                };
                transition(&mut fsm, event)?;
                return Err(err);
            }
        }

        let deployment = self
            .fetch_deployment(session, &endpoint.name, &spec.name)
            .await?;
        fsm.certify(deployment)
    }

    async fn fetch_endpoint(
        &self,
        session: &SessionContext,
        name: &str,
    ) -> Result<Endpoint, DeployError> {
        match self.platform.get_endpoint(session, name).await {
            Lookup::Found(endpoint) => Ok(endpoint),
            Lookup::NotFound => Err(lookup_failed(
                ResourceKind::Endpoint,
                name,
                PlatformError::NotFound(format!("endpoint '{}' vanished after provisioning", name)),
            )),
            Lookup::Failed(err) => Err(lookup_failed(ResourceKind::Endpoint, name, err)),
        }
    }

    async fn fetch_deployment(
        &self,
        session: &SessionContext,
        endpoint: &str,
        name: &str,
    ) -> Result<Deployment, DeployError> {
        match self.platform.get_deployment(session, endpoint, name).await {
            Lookup::Found(deployment) => Ok(deployment),
            Lookup::NotFound => Err(lookup_failed(
                ResourceKind::Deployment,
                name,
                PlatformError::NotFound(format!(
                    "deployment '{}' vanished after provisioning",
                    name
                )),
            )),
            Lookup::Failed(err) => Err(lookup_failed(ResourceKind::Deployment, name, err)),
        }
    }
}

/// Classify a lookup that could not tell whether the resource exists
pub(crate) fn lookup_failed(kind: ResourceKind, name: &str, err: PlatformError) -> DeployError {
    match err {
        PlatformError::Unauthorized(message) => DeployError::AuthenticationFailed(message),
        source => DeployError::ResourceLookupFailed {
            kind,
            name: name.to_string(),
            source,
        },
    }
}

fn failure_event(err: &DeployError) -> DeploymentEvent {
    match err {
        DeployError::ProvisioningTimedOut { .. } => DeploymentEvent::TimedOut,
        DeployError::ProvisioningFailed { diagnostic, .. } => {
            DeploymentEvent::ProvisioningFailed(diagnostic.clone())
        }
        other => DeploymentEvent::ProvisioningFailed(other.to_string()),
    }
}

fn transition(fsm: &mut DeploymentFsm, event: DeploymentEvent) -> Result<(), DeployError> {
    fsm.process(event).map_err(DeployError::InvalidTransition)
}
