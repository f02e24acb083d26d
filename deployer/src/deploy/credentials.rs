//! Endpoint key export

use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::errors::DeployError;
use crate::models::credentials::EndpointCredentials;
use crate::models::endpoint::Endpoint;
use crate::platform::ServingPlatform;
use crate::session::context::SessionContext;

/// Path segment of the OpenAI-compatible API behind the scoring URI
pub const API_VERSION_SEGMENT: &str = "v1";

pub struct CredentialExporter {
    platform: Arc<dyn ServingPlatform>,
}

impl CredentialExporter {
    pub fn new(platform: Arc<dyn ServingPlatform>) -> Self {
        Self { platform }
    }

    /// Read the endpoint keys and compose the client-facing scoring URL
    pub async fn export_credentials(
        &self,
        session: &SessionContext,
        endpoint: &Endpoint,
    ) -> Result<EndpointCredentials, DeployError> {
        let scoring_uri = endpoint.scoring_uri.as_deref().ok_or_else(|| {
            DeployError::Validation(format!("endpoint '{}' has no scoring URI", endpoint.name))
        })?;
        let scoring_url = scoring_url(scoring_uri)?;

        let keys = self.platform.get_keys(session, &endpoint.name).await?;
        info!("Scoring URL for endpoint '{}': {}", endpoint.name, scoring_url);

        Ok(EndpointCredentials {
            primary_key: keys.primary_key,
            secondary_key: keys.secondary_key,
            scoring_url,
        })
    }
}

/// Append the API version segment to a scoring URI
pub fn scoring_url(scoring_uri: &str) -> Result<String, DeployError> {
    let trimmed = scoring_uri.trim().trim_end_matches('/');
    let mut url = Url::parse(trimmed).map_err(|e| {
        DeployError::Validation(format!("invalid scoring URI '{}': {}", scoring_uri, e))
    })?;
    if url.cannot_be_a_base() {
        return Err(DeployError::Validation(format!(
            "invalid scoring URI '{}'",
            scoring_uri
        )));
    }

    url.path_segments_mut()
        .map_err(|_| DeployError::Validation(format!("invalid scoring URI '{}'", scoring_uri)))?
        .pop_if_empty()
        .push(API_VERSION_SEGMENT);
    Ok(url.to_string())
}
