//! Azure Machine Learning managed online endpoints

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::http::arm::{
    iso8601, AsyncOperationBody, BuildContextBody, EnvironmentVersionProperties,
    EnvironmentVersionResource, InferenceConfigBody, OnlineDeploymentProperties,
    OnlineDeploymentResource, OnlineEndpointProperties, OnlineEndpointResource,
    ProbeSettingsBody, RequestSettingsBody, RouteBody, SkuBody,
};
use crate::http::client::{HttpClient, DEFAULT_MANAGEMENT_URL};
use crate::models::credentials::EndpointKeys;
use crate::models::deployment::{Deployment, DeploymentSpec, ProbePolicy};
use crate::models::endpoint::{AuthMode, Endpoint, EndpointSpec};
use crate::models::environment::{Environment, EnvironmentSpec, Route};
use crate::models::model::{ModelRef, RegisteredModel};
use crate::models::operation::{
    Accepted, OperationHandle, OperationStatus, ProbeOutcome, ProvisioningState, ResourceKind,
};
use crate::models::traffic::TrafficTable;
use crate::platform::{Lookup, PlatformError, ServingPlatform};
use crate::session::context::SessionContext;

/// Longest asset name the registry accepts
const MAX_ASSET_NAME_LEN: usize = 255;

/// Serving platform backed by the Resource Manager API
pub struct AzureMlPlatform {
    http: HttpClient,
    location: OnceCell<String>,
}

impl AzureMlPlatform {
    pub fn new(base_url: &str) -> Result<Self, PlatformError> {
        Ok(Self::with_client(HttpClient::new(base_url)?))
    }

    /// Platform on the public Azure cloud
    pub fn public_cloud() -> Result<Self, PlatformError> {
        Self::new(DEFAULT_MANAGEMENT_URL)
    }

    pub fn with_client(http: HttpClient) -> Self {
        Self {
            http,
            location: OnceCell::new(),
        }
    }

    async fn authorization(&self, session: &SessionContext) -> Result<String, PlatformError> {
        session
            .authorization()
            .await
            .map_err(|e| PlatformError::Unauthorized(e.to_string()))
    }

    /// Region of the workspace, fetched once
    async fn location(&self, session: &SessionContext) -> Result<String, PlatformError> {
        let location = self
            .location
            .get_or_try_init(|| async {
                let authorization = self.authorization(session).await?;
                let workspace = self
                    .http
                    .get_workspace(session.get_workspace_identity(), &authorization)
                    .await?;
                debug!("Workspace location: {}", workspace.location);
                Ok::<_, PlatformError>(workspace.location)
            })
            .await?;
        Ok(location.clone())
    }

    async fn fetch_model(
        &self,
        session: &SessionContext,
        name: &str,
    ) -> Result<RegisteredModel, PlatformError> {
        if !is_registrable_name(name) {
            debug!("'{}' is not a valid asset name; skipping catalog lookup", name);
            return Err(PlatformError::NotFound(format!("model '{}'", name)));
        }

        let authorization = self.authorization(session).await?;
        let container = self
            .http
            .get_model_container(session.get_workspace_identity(), name, &authorization)
            .await?;
        let version = container
            .properties
            .latest_version
            .ok_or_else(|| PlatformError::NotFound(format!("model '{}' has no versions", name)))?;

        Ok(RegisteredModel {
            asset_id: format!("{}/versions/{}", container.id, version),
            name: container.name,
            version,
        })
    }

    async fn fetch_environment(
        &self,
        session: &SessionContext,
        name: &str,
        version: &str,
    ) -> Result<Environment, PlatformError> {
        if !is_registrable_name(name) {
            return Err(PlatformError::NotFound(format!("environment '{}'", name)));
        }

        let authorization = self.authorization(session).await?;
        let resource = self
            .http
            .get_environment_version(
                session.get_workspace_identity(),
                name,
                version,
                &authorization,
            )
            .await?;
        Ok(Environment {
            name: name.to_string(),
            version: version.to_string(),
            asset_id: resource.id,
        })
    }

    async fn fetch_endpoint(
        &self,
        session: &SessionContext,
        name: &str,
    ) -> Result<Endpoint, PlatformError> {
        let authorization = self.authorization(session).await?;
        let resource = self
            .http
            .get_online_endpoint(session.get_workspace_identity(), name, &authorization)
            .await?;
        Ok(to_endpoint(name, resource))
    }

    async fn fetch_deployment(
        &self,
        session: &SessionContext,
        endpoint: &str,
        name: &str,
    ) -> Result<Deployment, PlatformError> {
        let authorization = self.authorization(session).await?;
        let resource = self
            .http
            .get_online_deployment(
                session.get_workspace_identity(),
                endpoint,
                name,
                &authorization,
            )
            .await?;
        Ok(to_deployment(endpoint, name, resource))
    }
}

/// Whether the registry could ever hold an asset with this name
fn is_registrable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    name.len() <= MAX_ASSET_NAME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn operation(kind: ResourceKind, name: &str, url: Option<String>) -> OperationHandle {
    match url {
        Some(url) => OperationHandle::pending(kind, name, url),
        None => OperationHandle::completed(kind, name),
    }
}

fn route_body(route: &Route) -> RouteBody {
    RouteBody {
        path: route.path.clone(),
        port: route.port,
    }
}

fn probe_body(policy: &ProbePolicy) -> ProbeSettingsBody {
    ProbeSettingsBody {
        failure_threshold: policy.failure_threshold,
        success_threshold: policy.success_threshold,
        timeout: iso8601(policy.timeout),
        period: iso8601(policy.period),
        initial_delay: iso8601(policy.initial_delay),
    }
}

fn parse_auth_mode(value: &str) -> AuthMode {
    if value.eq_ignore_ascii_case("AMLToken") {
        AuthMode::AmlToken
    } else {
        AuthMode::Key
    }
}

fn to_endpoint(name: &str, resource: OnlineEndpointResource) -> Endpoint {
    let properties = resource.properties;
    Endpoint {
        name: if resource.name.is_empty() {
            name.to_string()
        } else {
            resource.name
        },
        location: resource.location,
        auth_mode: parse_auth_mode(&properties.auth_mode),
        description: properties.description,
        scoring_uri: properties.scoring_uri,
        traffic: TrafficTable::from(properties.traffic.unwrap_or_default()),
        provisioning_state: properties
            .provisioning_state
            .as_deref()
            .map(ProvisioningState::parse)
            .unwrap_or_default(),
    }
}

fn to_deployment(endpoint: &str, name: &str, resource: OnlineDeploymentResource) -> Deployment {
    let properties = resource.properties;
    Deployment {
        name: if resource.name.is_empty() {
            name.to_string()
        } else {
            resource.name
        },
        endpoint_name: endpoint.to_string(),
        model: properties.model.unwrap_or_default(),
        environment: properties.environment_id.unwrap_or_default(),
        instance_type: properties.instance_type.unwrap_or_default(),
        instance_count: resource.sku.capacity,
        provisioning_state: properties
            .provisioning_state
            .as_deref()
            .map(ProvisioningState::parse)
            .unwrap_or_default(),
    }
}

/// Interpret the answer of an operation URL
fn operation_status(status: reqwest::StatusCode, body: &str) -> OperationStatus {
    if status == reqwest::StatusCode::ACCEPTED {
        return OperationStatus::InProgress;
    }

    // Location-style URLs answer with the finished resource instead
    let Ok(operation) = serde_json::from_str::<AsyncOperationBody>(body) else {
        return OperationStatus::Succeeded;
    };
    match ProvisioningState::parse(&operation.status) {
        ProvisioningState::Succeeded => OperationStatus::Succeeded,
        ProvisioningState::Failed => OperationStatus::Failed(body.to_string()),
        ProvisioningState::Canceled => OperationStatus::Canceled(body.to_string()),
        _ => OperationStatus::InProgress,
    }
}

#[async_trait]
impl ServingPlatform for AzureMlPlatform {
    async fn get_model(&self, session: &SessionContext, name: &str) -> Lookup<RegisteredModel> {
        self.fetch_model(session, name).await.into()
    }

    async fn get_environment(
        &self,
        session: &SessionContext,
        name: &str,
        version: &str,
    ) -> Lookup<Environment> {
        self.fetch_environment(session, name, version).await.into()
    }

    async fn create_environment(
        &self,
        session: &SessionContext,
        spec: &EnvironmentSpec,
    ) -> Result<Accepted<Environment>, PlatformError> {
        let authorization = self.authorization(session).await?;
        let body = EnvironmentVersionResource {
            id: String::new(),
            name: String::new(),
            properties: EnvironmentVersionProperties {
                description: spec.description.clone(),
                build: Some(BuildContextBody {
                    context_uri: spec.build.context_uri.clone(),
                    dockerfile_path: spec.build.dockerfile_path.clone(),
                }),
                inference_config: Some(InferenceConfigBody {
                    liveness_route: route_body(&spec.inference.liveness),
                    readiness_route: route_body(&spec.inference.readiness),
                    scoring_route: route_body(&spec.inference.scoring),
                }),
                os_type: Some("Linux".to_string()),
            },
        };

        let response = self
            .http
            .put_environment_version(
                session.get_workspace_identity(),
                &spec.name,
                &spec.version,
                &body,
                &authorization,
            )
            .await?;
        info!("Environment '{}' version {} submitted", spec.name, spec.version);

        Ok(Accepted {
            resource: Environment {
                name: spec.name.clone(),
                version: spec.version.clone(),
                asset_id: response.body.id,
            },
            operation: operation(ResourceKind::Environment, &spec.name, response.operation_url),
        })
    }

    async fn get_endpoint(&self, session: &SessionContext, name: &str) -> Lookup<Endpoint> {
        self.fetch_endpoint(session, name).await.into()
    }

    async fn create_endpoint(
        &self,
        session: &SessionContext,
        spec: &EndpointSpec,
    ) -> Result<Accepted<Endpoint>, PlatformError> {
        let location = self.location(session).await?;
        let authorization = self.authorization(session).await?;
        let body = OnlineEndpointResource {
            name: String::new(),
            location,
            properties: OnlineEndpointProperties {
                auth_mode: spec.auth_mode.as_str().to_string(),
                description: spec.description.clone(),
                traffic: None,
                scoring_uri: None,
                provisioning_state: None,
            },
        };

        let response = self
            .http
            .put_online_endpoint(
                session.get_workspace_identity(),
                &spec.name,
                &body,
                &authorization,
            )
            .await?;
        Ok(Accepted {
            resource: to_endpoint(&spec.name, response.body),
            operation: operation(ResourceKind::Endpoint, &spec.name, response.operation_url),
        })
    }

    async fn update_traffic(
        &self,
        session: &SessionContext,
        endpoint: &Endpoint,
        table: &TrafficTable,
    ) -> Result<Accepted<Endpoint>, PlatformError> {
        let authorization = self.authorization(session).await?;
        let body = OnlineEndpointResource {
            name: String::new(),
            location: endpoint.location.clone(),
            properties: OnlineEndpointProperties {
                auth_mode: endpoint.auth_mode.as_str().to_string(),
                description: endpoint.description.clone(),
                traffic: Some(
                    table
                        .iter()
                        .map(|(name, weight)| (name.to_string(), weight))
                        .collect(),
                ),
                scoring_uri: None,
                provisioning_state: None,
            },
        };

        let response = self
            .http
            .put_online_endpoint(
                session.get_workspace_identity(),
                &endpoint.name,
                &body,
                &authorization,
            )
            .await?;
        Ok(Accepted {
            resource: to_endpoint(&endpoint.name, response.body),
            operation: operation(ResourceKind::Endpoint, &endpoint.name, response.operation_url),
        })
    }

    async fn get_deployment(
        &self,
        session: &SessionContext,
        endpoint: &str,
        name: &str,
    ) -> Lookup<Deployment> {
        self.fetch_deployment(session, endpoint, name).await.into()
    }

    async fn create_or_update_deployment(
        &self,
        session: &SessionContext,
        endpoint: &Endpoint,
        spec: &DeploymentSpec,
        model: &ModelRef,
        environment: &Environment,
    ) -> Result<Accepted<Deployment>, PlatformError> {
        let authorization = self.authorization(session).await?;
        let limits = &spec.request_limits;
        let body = OnlineDeploymentResource {
            name: String::new(),
            location: endpoint.location.clone(),
            sku: SkuBody {
                name: "Default".to_string(),
                capacity: spec.instance_count,
            },
            properties: OnlineDeploymentProperties {
                endpoint_compute_type: "Managed".to_string(),
                model: Some(model.reference().to_string()),
                environment_id: Some(environment.asset_id.clone()),
                instance_type: Some(spec.instance_type.clone()),
                environment_variables: spec.environment_variables.clone(),
                request_settings: Some(RequestSettingsBody {
                    max_concurrent_requests_per_instance: limits
                        .max_concurrent_requests_per_instance,
                    request_timeout: iso8601(limits.request_timeout),
                    max_queue_wait: iso8601(limits.max_queue_wait),
                }),
                liveness_probe: Some(probe_body(&spec.liveness_probe)),
                readiness_probe: Some(probe_body(&spec.readiness_probe)),
                provisioning_state: None,
            },
        };

        let response = self
            .http
            .put_online_deployment(
                session.get_workspace_identity(),
                &endpoint.name,
                &spec.name,
                &body,
                &authorization,
            )
            .await?;
        Ok(Accepted {
            resource: to_deployment(&endpoint.name, &spec.name, response.body),
            operation: operation(ResourceKind::Deployment, &spec.name, response.operation_url),
        })
    }

    async fn operation_status(
        &self,
        session: &SessionContext,
        operation: &OperationHandle,
    ) -> Result<OperationStatus, PlatformError> {
        let Some(url) = &operation.status_url else {
            return Ok(OperationStatus::Succeeded);
        };

        let authorization = self.authorization(session).await?;
        let response = self.http.get_operation(url, &authorization).await?;
        Ok(operation_status(response.status, &response.body))
    }

    /// The platform runs the container's readiness route itself and only
    /// reports the deployment as succeeded once it passes
    async fn probe_readiness(
        &self,
        session: &SessionContext,
        endpoint: &str,
        deployment: &str,
    ) -> Result<ProbeOutcome, PlatformError> {
        let current = self.fetch_deployment(session, endpoint, deployment).await?;
        Ok(match current.provisioning_state {
            ProvisioningState::Succeeded => ProbeOutcome::Pass,
            state => ProbeOutcome::Fail(format!("deployment is {}", state)),
        })
    }

    async fn get_keys(
        &self,
        session: &SessionContext,
        endpoint: &str,
    ) -> Result<EndpointKeys, PlatformError> {
        let authorization = self.authorization(session).await?;
        let keys = self
            .http
            .list_endpoint_keys(session.get_workspace_identity(), endpoint, &authorization)
            .await?;
        Ok(EndpointKeys {
            primary_key: SecretString::from(keys.primary_key),
            secondary_key: SecretString::from(keys.secondary_key),
        })
    }
}
