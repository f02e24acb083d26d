//! Online endpoint API calls

use crate::http::arm::{EndpointKeysBody, OnlineEndpointResource};
use crate::http::client::{ArmResponse, HttpClient};
use crate::http::workspace_path;
use crate::platform::PlatformError;
use crate::session::context::WorkspaceIdentity;

fn endpoint_path(identity: &WorkspaceIdentity, name: &str) -> String {
    format!("{}/onlineEndpoints/{}", workspace_path(identity), name)
}

impl HttpClient {
    pub async fn get_online_endpoint(
        &self,
        identity: &WorkspaceIdentity,
        name: &str,
        authorization: &str,
    ) -> Result<OnlineEndpointResource, PlatformError> {
        self.get(&endpoint_path(identity, name), authorization).await
    }

    /// Create or update an endpoint, traffic included
    pub async fn put_online_endpoint(
        &self,
        identity: &WorkspaceIdentity,
        name: &str,
        body: &OnlineEndpointResource,
        authorization: &str,
    ) -> Result<ArmResponse<OnlineEndpointResource>, PlatformError> {
        self.put(&endpoint_path(identity, name), authorization, body)
            .await
    }

    /// List the endpoint's authentication keys
    pub async fn list_endpoint_keys(
        &self,
        identity: &WorkspaceIdentity,
        name: &str,
        authorization: &str,
    ) -> Result<EndpointKeysBody, PlatformError> {
        let path = format!("{}/listKeys", endpoint_path(identity, name));
        self.post(&path, authorization).await
    }
}
