//! In-memory serving platform
//!
//! Behaves like the managed platform closely enough to drive a whole run:
//! creates are accepted and complete after a configurable number of polls,
//! readiness passes after a configurable number of probe cycles, and failures
//! can be injected per resource kind. Backs `--dry-run` and the test-suite.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;
use uuid::Uuid;

use crate::models::credentials::EndpointKeys;
use crate::models::deployment::{Deployment, DeploymentSpec};
use crate::models::endpoint::{Endpoint, EndpointSpec};
use crate::models::environment::{Environment, EnvironmentSpec};
use crate::models::model::{ModelRef, RegisteredModel};
use crate::models::operation::{
    Accepted, OperationHandle, OperationStatus, ProbeOutcome, ProvisioningState, ResourceKind,
};
use crate::models::traffic::TrafficTable;
use crate::platform::{Lookup, PlatformError, ServingPlatform};
use crate::session::context::SessionContext;

/// Calls issued against the platform, by kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub model_lookups: u32,
    pub environment_creates: u32,
    pub endpoint_creates: u32,
    pub deployment_creates: u32,
    pub deployment_updates: u32,
    pub traffic_updates: u32,
    pub status_queries: u32,
    pub probes: u32,
    pub key_reads: u32,
}

#[derive(Debug, Clone)]
struct Behavior {
    location: String,
    operation_polls: u32,
    readiness_after: u32,
    deployment_failure: Option<String>,
    deployment_rejection: Option<String>,
    never_terminate: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            location: "eastus".to_string(),
            operation_polls: 1,
            readiness_after: 0,
            deployment_failure: None,
            deployment_rejection: None,
            never_terminate: false,
        }
    }
}

#[derive(Debug, Clone)]
enum Target {
    Environment,
    Endpoint(String),
    Deployment(String, String),
}

#[derive(Debug, Clone)]
struct PendingOperation {
    remaining: u32,
    failure: Option<String>,
    target: Target,
}

#[derive(Debug, Default)]
struct State {
    models: HashMap<String, RegisteredModel>,
    environments: HashMap<(String, String), Environment>,
    endpoints: HashMap<String, Endpoint>,
    deployments: HashMap<(String, String), Deployment>,
    operations: HashMap<String, PendingOperation>,
    probes: HashMap<(String, String), u32>,
    lookup_failures: HashMap<ResourceKind, u32>,
    calls: CallCounts,
}

/// Serving platform held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    behavior: Behavior,
    state: RwLock<State>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model in the catalog
    pub fn with_model(mut self, model: RegisteredModel) -> Self {
        self.state_mut().models.insert(model.name.clone(), model);
        self
    }

    /// Region reported for created endpoints
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.behavior.location = location.into();
        self
    }

    /// Status queries that report `InProgress` before an operation completes
    pub fn with_operation_polls(mut self, polls: u32) -> Self {
        self.behavior.operation_polls = polls;
        self
    }

    /// Probe cycles that fail before readiness passes
    pub fn with_readiness_after(mut self, failures: u32) -> Self {
        self.behavior.readiness_after = failures;
        self
    }

    /// Make every deployment operation end in `Failed` with this diagnostic
    pub fn with_deployment_failure(mut self, diagnostic: impl Into<String>) -> Self {
        self.behavior.deployment_failure = Some(diagnostic.into());
        self
    }

    /// Refuse every deployment create or update call
    pub fn with_deployment_rejection(mut self, message: impl Into<String>) -> Self {
        self.behavior.deployment_rejection = Some(message.into());
        self
    }

    /// Keep every operation in progress forever
    pub fn with_never_terminate(mut self) -> Self {
        self.behavior.never_terminate = true;
        self
    }

    /// Fail the next `times` lookups of `kind` with a transient error
    pub fn with_lookup_failures(mut self, kind: ResourceKind, times: u32) -> Self {
        self.state_mut().lookup_failures.insert(kind, times);
        self
    }

    pub fn calls(&self) -> CallCounts {
        self.read().calls.clone()
    }

    /// Operations accepted but not yet reported as finished
    pub fn pending_operations(&self) -> usize {
        self.read().operations.len()
    }

    pub fn endpoint(&self, name: &str) -> Option<Endpoint> {
        self.read().endpoints.get(name).cloned()
    }

    pub fn deployment(&self, endpoint: &str, name: &str) -> Option<Deployment> {
        self.read()
            .deployments
            .get(&(endpoint.to_string(), name.to_string()))
            .cloned()
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn accept(
        &self,
        state: &mut State,
        kind: ResourceKind,
        name: &str,
        target: Target,
        failure: Option<String>,
    ) -> OperationHandle {
        let status_url = format!("memory://operations/{}", Uuid::new_v4());
        let operation = OperationHandle::pending(kind, name, status_url);
        state.operations.insert(
            operation.id.clone(),
            PendingOperation {
                remaining: self.behavior.operation_polls,
                failure,
                target,
            },
        );
        operation
    }
}

/// Consume one injected lookup failure for `kind`, if any remain
fn injected_failure(state: &mut State, kind: ResourceKind) -> Option<PlatformError> {
    let remaining = state.lookup_failures.get_mut(&kind)?;
    if *remaining == 0 {
        return None;
    }
    *remaining -= 1;
    Some(PlatformError::Api {
        status: 503,
        message: format!("{} lookup temporarily unavailable", kind),
    })
}

fn finish(state: &mut State, target: &Target, outcome: ProvisioningState) {
    match target {
        Target::Environment => {}
        Target::Endpoint(name) => {
            if let Some(endpoint) = state.endpoints.get_mut(name) {
                endpoint.provisioning_state = outcome;
            }
        }
        Target::Deployment(endpoint, name) => {
            if let Some(deployment) = state
                .deployments
                .get_mut(&(endpoint.clone(), name.clone()))
            {
                deployment.provisioning_state = outcome;
            }
        }
    }
}

#[async_trait]
impl ServingPlatform for InMemoryPlatform {
    async fn get_model(&self, _session: &SessionContext, name: &str) -> Lookup<RegisteredModel> {
        let mut state = self.write();
        state.calls.model_lookups += 1;
        if let Some(err) = injected_failure(&mut state, ResourceKind::Model) {
            return Lookup::Failed(err);
        }
        match state.models.get(name) {
            Some(model) => Lookup::Found(model.clone()),
            None => Lookup::NotFound,
        }
    }

    async fn get_environment(
        &self,
        _session: &SessionContext,
        name: &str,
        version: &str,
    ) -> Lookup<Environment> {
        let mut state = self.write();
        if let Some(err) = injected_failure(&mut state, ResourceKind::Environment) {
            return Lookup::Failed(err);
        }
        match state.environments.get(&(name.to_string(), version.to_string())) {
            Some(environment) => Lookup::Found(environment.clone()),
            None => Lookup::NotFound,
        }
    }

    async fn create_environment(
        &self,
        _session: &SessionContext,
        spec: &EnvironmentSpec,
    ) -> Result<Accepted<Environment>, PlatformError> {
        let mut state = self.write();
        state.calls.environment_creates += 1;

        let environment = Environment {
            name: spec.name.clone(),
            version: spec.version.clone(),
            asset_id: format!("azureml:{}:{}", spec.name, spec.version),
        };
        state.environments.insert(
            (spec.name.clone(), spec.version.clone()),
            environment.clone(),
        );
        let operation = self.accept(
            &mut state,
            ResourceKind::Environment,
            &spec.name,
            Target::Environment,
            None,
        );
        Ok(Accepted {
            resource: environment,
            operation,
        })
    }

    async fn get_endpoint(&self, _session: &SessionContext, name: &str) -> Lookup<Endpoint> {
        let mut state = self.write();
        if let Some(err) = injected_failure(&mut state, ResourceKind::Endpoint) {
            return Lookup::Failed(err);
        }
        match state.endpoints.get(name) {
            Some(endpoint) => Lookup::Found(endpoint.clone()),
            None => Lookup::NotFound,
        }
    }

    async fn create_endpoint(
        &self,
        _session: &SessionContext,
        spec: &EndpointSpec,
    ) -> Result<Accepted<Endpoint>, PlatformError> {
        let mut state = self.write();
        state.calls.endpoint_creates += 1;

        let endpoint = Endpoint {
            name: spec.name.clone(),
            location: self.behavior.location.clone(),
            auth_mode: spec.auth_mode,
            description: spec.description.clone(),
            scoring_uri: Some(format!(
                "https://{}.{}.inference.ml.azure.com/",
                spec.name.to_lowercase(),
                self.behavior.location
            )),
            traffic: TrafficTable::new(),
            provisioning_state: ProvisioningState::Creating,
        };
        state.endpoints.insert(spec.name.clone(), endpoint.clone());
        let operation = self.accept(
            &mut state,
            ResourceKind::Endpoint,
            &spec.name,
            Target::Endpoint(spec.name.clone()),
            None,
        );
        Ok(Accepted {
            resource: endpoint,
            operation,
        })
    }

    async fn update_traffic(
        &self,
        _session: &SessionContext,
        endpoint: &Endpoint,
        table: &TrafficTable,
    ) -> Result<Accepted<Endpoint>, PlatformError> {
        let mut state = self.write();
        state.calls.traffic_updates += 1;

        for (deployment, _) in table.weighted() {
            if !state
                .deployments
                .contains_key(&(endpoint.name.clone(), deployment.to_string()))
            {
                return Err(PlatformError::Api {
                    status: 400,
                    message: format!(
                        "deployment '{}' does not exist on endpoint '{}'",
                        deployment, endpoint.name
                    ),
                });
            }
        }

        let updated = {
            let current = state
                .endpoints
                .get_mut(&endpoint.name)
                .ok_or_else(|| PlatformError::NotFound(format!("endpoint '{}'", endpoint.name)))?;
            current.traffic = table.clone();
            current.provisioning_state = ProvisioningState::Updating;
            current.clone()
        };
        let operation = self.accept(
            &mut state,
            ResourceKind::Endpoint,
            &endpoint.name,
            Target::Endpoint(endpoint.name.clone()),
            None,
        );
        Ok(Accepted {
            resource: updated,
            operation,
        })
    }

    async fn get_deployment(
        &self,
        _session: &SessionContext,
        endpoint: &str,
        name: &str,
    ) -> Lookup<Deployment> {
        let mut state = self.write();
        if let Some(err) = injected_failure(&mut state, ResourceKind::Deployment) {
            return Lookup::Failed(err);
        }
        match state
            .deployments
            .get(&(endpoint.to_string(), name.to_string()))
        {
            Some(deployment) => Lookup::Found(deployment.clone()),
            None => Lookup::NotFound,
        }
    }

    async fn create_or_update_deployment(
        &self,
        _session: &SessionContext,
        endpoint: &Endpoint,
        spec: &DeploymentSpec,
        model: &ModelRef,
        environment: &Environment,
    ) -> Result<Accepted<Deployment>, PlatformError> {
        let mut state = self.write();
        if !state.endpoints.contains_key(&endpoint.name) {
            return Err(PlatformError::NotFound(format!("endpoint '{}'", endpoint.name)));
        }

        let key = (endpoint.name.clone(), spec.name.clone());
        let exists = state.deployments.contains_key(&key);
        if exists {
            state.calls.deployment_updates += 1;
        } else {
            state.calls.deployment_creates += 1;
        }

        if let Some(message) = &self.behavior.deployment_rejection {
            return Err(PlatformError::Api {
                status: 400,
                message: message.clone(),
            });
        }

        let deployment = Deployment {
            name: spec.name.clone(),
            endpoint_name: endpoint.name.clone(),
            model: model.reference().to_string(),
            environment: environment.asset_id.clone(),
            instance_type: spec.instance_type.clone(),
            instance_count: spec.instance_count,
            provisioning_state: if exists {
                ProvisioningState::Updating
            } else {
                ProvisioningState::Creating
            },
        };
        state.deployments.insert(key.clone(), deployment.clone());
        state.probes.insert(key, 0);

        let operation = self.accept(
            &mut state,
            ResourceKind::Deployment,
            &spec.name,
            Target::Deployment(endpoint.name.clone(), spec.name.clone()),
            self.behavior.deployment_failure.clone(),
        );
        Ok(Accepted {
            resource: deployment,
            operation,
        })
    }

    async fn operation_status(
        &self,
        _session: &SessionContext,
        operation: &OperationHandle,
    ) -> Result<OperationStatus, PlatformError> {
        let mut state = self.write();
        state.calls.status_queries += 1;

        if operation.status_url.is_none() {
            return Ok(OperationStatus::Succeeded);
        }
        if self.behavior.never_terminate {
            return Ok(OperationStatus::InProgress);
        }

        let pending = state
            .operations
            .get_mut(&operation.id)
            .ok_or_else(|| PlatformError::NotFound(format!("operation '{}'", operation.id)))?;
        if pending.remaining > 0 {
            pending.remaining -= 1;
            debug!(operation = %operation.id, remaining = pending.remaining, "Operation in progress");
            return Ok(OperationStatus::InProgress);
        }

        let pending = pending.clone();
        state.operations.remove(&operation.id);
        match pending.failure {
            Some(diagnostic) => {
                finish(&mut state, &pending.target, ProvisioningState::Failed);
                Ok(OperationStatus::Failed(diagnostic))
            }
            None => {
                finish(&mut state, &pending.target, ProvisioningState::Succeeded);
                Ok(OperationStatus::Succeeded)
            }
        }
    }

    async fn probe_readiness(
        &self,
        _session: &SessionContext,
        endpoint: &str,
        deployment: &str,
    ) -> Result<ProbeOutcome, PlatformError> {
        let mut state = self.write();
        state.calls.probes += 1;

        let readiness_after = self.behavior.readiness_after;
        let cycles = state
            .probes
            .get_mut(&(endpoint.to_string(), deployment.to_string()))
            .ok_or_else(|| PlatformError::NotFound(format!("deployment '{}'", deployment)))?;
        *cycles += 1;

        if *cycles > readiness_after {
            Ok(ProbeOutcome::Pass)
        } else {
            Ok(ProbeOutcome::Fail("GET /health returned 503".to_string()))
        }
    }

    async fn get_keys(
        &self,
        _session: &SessionContext,
        endpoint: &str,
    ) -> Result<EndpointKeys, PlatformError> {
        let mut state = self.write();
        state.calls.key_reads += 1;
        if !state.endpoints.contains_key(endpoint) {
            return Err(PlatformError::NotFound(format!("endpoint '{}'", endpoint)));
        }

        Ok(EndpointKeys {
            primary_key: SecretString::from(Uuid::new_v4().simple().to_string()),
            secondary_key: SecretString::from(Uuid::new_v4().simple().to_string()),
        })
    }
}
