//! Workspace, model and environment API calls

use crate::http::arm::{
    EnvironmentVersionResource, ModelContainerResource, WorkspaceResource,
};
use crate::http::client::{ArmResponse, HttpClient};
use crate::http::workspace_path;
use crate::platform::PlatformError;
use crate::session::context::WorkspaceIdentity;

impl HttpClient {
    /// Get the workspace resource
    pub async fn get_workspace(
        &self,
        identity: &WorkspaceIdentity,
        authorization: &str,
    ) -> Result<WorkspaceResource, PlatformError> {
        self.get(&workspace_path(identity), authorization).await
    }

    /// Get a model container, which names its latest version
    pub async fn get_model_container(
        &self,
        identity: &WorkspaceIdentity,
        name: &str,
        authorization: &str,
    ) -> Result<ModelContainerResource, PlatformError> {
        let path = format!("{}/models/{}", workspace_path(identity), name);
        self.get(&path, authorization).await
    }

    /// Get one version of an environment
    pub async fn get_environment_version(
        &self,
        identity: &WorkspaceIdentity,
        name: &str,
        version: &str,
        authorization: &str,
    ) -> Result<EnvironmentVersionResource, PlatformError> {
        let path = format!(
            "{}/environments/{}/versions/{}",
            workspace_path(identity),
            name,
            version
        );
        self.get(&path, authorization).await
    }

    /// Create or update one version of an environment
    pub async fn put_environment_version(
        &self,
        identity: &WorkspaceIdentity,
        name: &str,
        version: &str,
        body: &EnvironmentVersionResource,
        authorization: &str,
    ) -> Result<ArmResponse<EnvironmentVersionResource>, PlatformError> {
        let path = format!(
            "{}/environments/{}/versions/{}",
            workspace_path(identity),
            name,
            version
        );
        self.put(&path, authorization, body).await
    }
}
