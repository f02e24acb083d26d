//! Token manager for management API authentication

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::authn::access_token::AccessToken;
use crate::errors::DeployError;

/// Scope requested for Azure Resource Manager tokens
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Default Entra ID authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Refresh tokens this many seconds before they expire
const REFRESH_MARGIN_SECS: i64 = 300;

/// Token manager trait for testability
#[async_trait]
pub trait TokenManagerExt: Send + Sync {
    /// Get a token that is valid for at least the refresh margin
    async fn get_token(&self) -> Result<AccessToken, DeployError>;

    /// Force acquisition of a new token
    async fn refresh_token(&self) -> Result<AccessToken, DeployError>;
}

/// Where access tokens come from
#[derive(Debug)]
pub enum Credential {
    /// A bearer token obtained out of band
    Static(SecretString),

    /// OAuth2 client-credentials grant for a service principal
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: SecretString,
        authority_host: String,
    },
}

impl Credential {
    /// Build a credential from the conventional Azure environment variables
    pub fn from_env() -> Result<Self, DeployError> {
        if let Ok(token) = env::var("AZURE_ACCESS_TOKEN") {
            if !token.is_empty() {
                return Ok(Credential::Static(SecretString::from(token)));
            }
        }

        match (
            env::var("AZURE_TENANT_ID"),
            env::var("AZURE_CLIENT_ID"),
            env::var("AZURE_CLIENT_SECRET"),
        ) {
            (Ok(tenant_id), Ok(client_id), Ok(client_secret)) => Ok(Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret: SecretString::from(client_secret),
                authority_host: env::var("AZURE_AUTHORITY_HOST")
                    .unwrap_or_else(|_| DEFAULT_AUTHORITY_HOST.to_string()),
            }),
            _ => Err(DeployError::AuthenticationFailed(
                "no credential configured: set AZURE_ACCESS_TOKEN, or AZURE_TENANT_ID, \
                 AZURE_CLIENT_ID and AZURE_CLIENT_SECRET"
                    .to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Token manager implementation
pub struct TokenManager {
    credential: Credential,
    http_client: Client,
    cached_token: RwLock<Option<AccessToken>>,
}

impl TokenManager {
    /// Create a new token manager
    pub fn new(credential: Credential) -> Result<Self, DeployError> {
        let http_client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            credential,
            http_client,
            cached_token: RwLock::new(None),
        })
    }

    async fn acquire(&self) -> Result<AccessToken, DeployError> {
        match &self.credential {
            Credential::Static(token) => Ok(AccessToken::from_raw(token.expose_secret().to_string())),
            Credential::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
                authority_host,
            } => {
                let url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    authority_host.trim_end_matches('/'),
                    tenant_id
                );
                debug!("POST {} (client credentials)", url);

                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.expose_secret()),
                    ("scope", MANAGEMENT_SCOPE),
                ];

                let response = self
                    .http_client
                    .post(&url)
                    .form(&form)
                    .send()
                    .await
                    .map_err(|e| DeployError::AuthenticationFailed(e.to_string()))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    error!("Token request failed: {} - {}", status, body);
                    return Err(DeployError::AuthenticationFailed(format!(
                        "token request failed: {} - {}",
                        status, body
                    )));
                }

                let body: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| DeployError::AuthenticationFailed(e.to_string()))?;

                Ok(match body.expires_in {
                    Some(expires_in) => AccessToken::with_lifetime(body.access_token, expires_in),
                    None => AccessToken::from_raw(body.access_token),
                })
            }
        }
    }
}

#[async_trait]
impl TokenManagerExt for TokenManager {
    async fn get_token(&self) -> Result<AccessToken, DeployError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.expires_within(REFRESH_MARGIN_SECS) {
                    return Ok(token.clone());
                }
            }
        }

        self.refresh_token().await
    }

    async fn refresh_token(&self) -> Result<AccessToken, DeployError> {
        let token = self.acquire().await?;
        if token.is_expired() {
            return Err(DeployError::AuthenticationFailed(format!(
                "access token expired at {}",
                token.expires_at()
            )));
        }

        info!("Access token acquired, expires at: {}", token.expires_at());

        let mut cached = self.cached_token.write().await;
        *cached = Some(token.clone());

        Ok(token)
    }
}
