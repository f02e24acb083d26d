//! Managed serving platform boundary

pub mod azure;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::credentials::EndpointKeys;
use crate::models::deployment::{Deployment, DeploymentSpec};
use crate::models::endpoint::{Endpoint, EndpointSpec};
use crate::models::environment::{Environment, EnvironmentSpec};
use crate::models::model::{ModelRef, RegisteredModel};
use crate::models::operation::{Accepted, OperationHandle, OperationStatus, ProbeOutcome};
use crate::models::traffic::TrafficTable;
use crate::session::context::SessionContext;

/// Errors raised at the platform boundary
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Credentials were missing, expired or rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Platform returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Response was well-formed but not usable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Outcome of looking a resource up by its identity key
///
/// Keeps "absent" apart from "could not tell": only `NotFound` may lead to a
/// create call.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Failed(PlatformError),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
            Lookup::Failed(err) => Lookup::Failed(err),
        }
    }
}

impl<T> From<Result<T, PlatformError>> for Lookup<T> {
    fn from(result: Result<T, PlatformError>) -> Self {
        match result {
            Ok(value) => Lookup::Found(value),
            Err(PlatformError::NotFound(_)) => Lookup::NotFound,
            Err(err) => Lookup::Failed(err),
        }
    }
}

/// Resource CRUD and operation status for one workspace
///
/// Every call takes the session explicitly; implementations hold no ambient
/// credentials.
#[async_trait]
pub trait ServingPlatform: Send + Sync {
    /// Latest registered version of a model
    async fn get_model(&self, session: &SessionContext, name: &str) -> Lookup<RegisteredModel>;

    async fn get_environment(
        &self,
        session: &SessionContext,
        name: &str,
        version: &str,
    ) -> Lookup<Environment>;

    async fn create_environment(
        &self,
        session: &SessionContext,
        spec: &EnvironmentSpec,
    ) -> Result<Accepted<Environment>, PlatformError>;

    async fn get_endpoint(&self, session: &SessionContext, name: &str) -> Lookup<Endpoint>;

    async fn create_endpoint(
        &self,
        session: &SessionContext,
        spec: &EndpointSpec,
    ) -> Result<Accepted<Endpoint>, PlatformError>;

    /// Replace the endpoint's traffic table
    async fn update_traffic(
        &self,
        session: &SessionContext,
        endpoint: &Endpoint,
        table: &TrafficTable,
    ) -> Result<Accepted<Endpoint>, PlatformError>;

    async fn get_deployment(
        &self,
        session: &SessionContext,
        endpoint: &str,
        name: &str,
    ) -> Lookup<Deployment>;

    /// Create the deployment, or update it in place when it exists
    async fn create_or_update_deployment(
        &self,
        session: &SessionContext,
        endpoint: &Endpoint,
        spec: &DeploymentSpec,
        model: &ModelRef,
        environment: &Environment,
    ) -> Result<Accepted<Deployment>, PlatformError>;

    /// Current status of an accepted operation
    async fn operation_status(
        &self,
        session: &SessionContext,
        operation: &OperationHandle,
    ) -> Result<OperationStatus, PlatformError>;

    /// Run one readiness probe cycle against a deployment
    async fn probe_readiness(
        &self,
        session: &SessionContext,
        endpoint: &str,
        deployment: &str,
    ) -> Result<ProbeOutcome, PlatformError>;

    async fn get_keys(
        &self,
        session: &SessionContext,
        endpoint: &str,
    ) -> Result<EndpointKeys, PlatformError>;
}
