//! Authenticated workspace session

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::authn::access_token::AccessToken;
use crate::authn::token_mngr::TokenManagerExt;
use crate::errors::DeployError;
use crate::filesys::file::File;

/// Coordinates of the workspace all resources live in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceIdentity {
    pub subscription_id: String,
    #[serde(alias = "resource_group_name")]
    pub resource_group: String,
    pub workspace_name: String,
}

impl WorkspaceIdentity {
    /// Read a workspace `config.json`
    pub async fn from_config(path: impl AsRef<Path>) -> Result<Self, DeployError> {
        let file = File::new(path.as_ref());
        if !file.exists().await {
            return Err(DeployError::ConfigError(format!(
                "workspace config not found: {}",
                path.as_ref().display()
            )));
        }

        let identity: WorkspaceIdentity = file.read_json().await?;
        identity.validate()?;
        Ok(identity)
    }

    pub fn validate(&self) -> Result<(), DeployError> {
        for (field, value) in [
            ("subscription_id", &self.subscription_id),
            ("resource_group", &self.resource_group),
            ("workspace_name", &self.workspace_name),
        ] {
            if value.trim().is_empty() {
                return Err(DeployError::ConfigError(format!(
                    "workspace config is missing '{}'",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Authenticated access to one workspace, passed into every platform call
#[derive(Clone)]
pub struct SessionContext {
    identity: WorkspaceIdentity,
    tokens: Arc<dyn TokenManagerExt>,
}

impl SessionContext {
    /// Connect to the workspace, acquiring a token up front so that
    /// authentication problems abort before any resource is touched
    pub async fn connect(
        identity: WorkspaceIdentity,
        tokens: Arc<dyn TokenManagerExt>,
    ) -> Result<Self, DeployError> {
        identity.validate()?;

        let token = tokens.get_token().await.map_err(|e| match e {
            DeployError::AuthenticationFailed(_) => e,
            other => DeployError::AuthenticationFailed(other.to_string()),
        })?;

        info!("Connected to workspace:");
        info!("  Subscription ID: {}", identity.subscription_id);
        info!("  Resource Group:  {}", identity.resource_group);
        info!("  Workspace Name:  {}", identity.workspace_name);
        if let Some(tenant) = token.tenant_id() {
            info!("  Tenant ID:       {}", tenant);
        }

        Ok(Self { identity, tokens })
    }

    pub fn get_workspace_identity(&self) -> &WorkspaceIdentity {
        &self.identity
    }

    /// Current access token, refreshed when close to expiry
    pub async fn access_token(&self) -> Result<AccessToken, DeployError> {
        self.tokens.get_token().await
    }

    /// Value of the `Authorization` header for platform requests
    pub async fn authorization(&self) -> Result<String, DeployError> {
        Ok(self.access_token().await?.bearer())
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
