//! Execution environment models

use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// An HTTP route served by the inference image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: String,
    pub port: u16,
}

impl Route {
    pub fn new(path: impl Into<String>, port: u16) -> Self {
        Self {
            path: path.into(),
            port,
        }
    }
}

/// Routes the platform uses to talk to the serving process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceContract {
    pub liveness: Route,
    pub readiness: Route,
    pub scoring: Route,
}

impl InferenceContract {
    /// Check that all routes target the single port the image listens on
    pub fn validate(&self) -> Result<(), DeployError> {
        let port = self.scoring.port;
        if port == 0 {
            return Err(DeployError::Validation(
                "inference routes must use a non-zero port".to_string(),
            ));
        }

        for (label, route) in self.routes() {
            if route.port != port {
                return Err(DeployError::Validation(format!(
                    "{} route uses port {} but the scoring route uses port {}",
                    label, route.port, port
                )));
            }
            if !route.path.starts_with('/') {
                return Err(DeployError::Validation(format!(
                    "{} route path '{}' must start with '/'",
                    label, route.path
                )));
            }
        }

        Ok(())
    }

    /// The port shared by all routes
    pub fn port(&self) -> u16 {
        self.scoring.port
    }

    fn routes(&self) -> [(&'static str, &Route); 3] {
        [
            ("liveness", &self.liveness),
            ("readiness", &self.readiness),
            ("scoring", &self.scoring),
        ]
    }
}

/// Where the platform builds the image from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    /// URI of the build context (storage folder or git repository)
    pub context_uri: String,

    /// Path of the Dockerfile relative to the context
    pub dockerfile_path: String,
}

/// Desired definition of an execution environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub build: BuildContext,
    pub inference: InferenceContract,
}

/// An environment version that exists on the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub version: String,
    /// Fully qualified asset id deployments reference
    pub asset_id: String,
}
