//! Endpoint access material

use secrecy::{ExposeSecret, SecretString};

/// Keys issued by the platform for a key-authenticated endpoint
#[derive(Debug)]
pub struct EndpointKeys {
    pub primary_key: SecretString,
    pub secondary_key: SecretString,
}

/// Everything a downstream consumer needs to call the endpoint
#[derive(Debug)]
pub struct EndpointCredentials {
    pub primary_key: SecretString,
    pub secondary_key: SecretString,
    /// Scoring URL including the protocol version suffix
    pub scoring_url: String,
}

impl EndpointCredentials {
    /// Build the configuration for an OpenAI-compatible client
    pub fn client_config(&self, model: impl Into<String>) -> ClientConfig {
        ClientConfig {
            scoring_url: self.scoring_url.clone(),
            api_key: SecretString::from(self.primary_key.expose_secret().to_string()),
            model: model.into(),
        }
    }
}

/// Input for bootstrapping a chat client
#[derive(Debug)]
pub struct ClientConfig {
    pub scoring_url: String,
    pub api_key: SecretString,
    /// Model identifier sent in every request
    pub model: String,
}

impl ClientConfig {
    pub fn new(scoring_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            scoring_url: scoring_url.into(),
            api_key: SecretString::from(api_key.into()),
            model: model.into(),
        }
    }

    /// Render as `KEY=value` lines understood by the chat client
    pub fn to_env_file(&self) -> String {
        format!(
            "SCORING_URL={}\nOPENAI_API_KEY={}\nMODEL_NAME={}\n",
            self.scoring_url,
            self.api_key.expose_secret(),
            self.model
        )
    }
}
