//! Online deployment API calls

use crate::http::arm::OnlineDeploymentResource;
use crate::http::client::{ArmResponse, HttpClient};
use crate::http::workspace_path;
use crate::platform::PlatformError;
use crate::session::context::WorkspaceIdentity;

fn deployment_path(identity: &WorkspaceIdentity, endpoint: &str, name: &str) -> String {
    format!(
        "{}/onlineEndpoints/{}/deployments/{}",
        workspace_path(identity),
        endpoint,
        name
    )
}

impl HttpClient {
    pub async fn get_online_deployment(
        &self,
        identity: &WorkspaceIdentity,
        endpoint: &str,
        name: &str,
        authorization: &str,
    ) -> Result<OnlineDeploymentResource, PlatformError> {
        self.get(&deployment_path(identity, endpoint, name), authorization)
            .await
    }

    /// Create a deployment, or update it in place
    pub async fn put_online_deployment(
        &self,
        identity: &WorkspaceIdentity,
        endpoint: &str,
        name: &str,
        body: &OnlineDeploymentResource,
        authorization: &str,
    ) -> Result<ArmResponse<OnlineDeploymentResource>, PlatformError> {
        self.put(&deployment_path(identity, endpoint, name), authorization, body)
            .await
    }
}
