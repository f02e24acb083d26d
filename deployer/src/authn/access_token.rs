//! Platform access tokens

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::errors::DeployError;

/// Lifetime assumed for tokens that carry no readable expiry
const OPAQUE_TOKEN_LIFETIME_SECS: i64 = 60 * 60;

/// Claims of an Entra ID access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Expiration timestamp
    pub exp: i64,

    /// Tenant ID
    #[serde(default)]
    pub tid: Option<String>,

    /// Object ID of the signed-in principal
    #[serde(default)]
    pub oid: Option<String>,

    /// Audience
    #[serde(default)]
    pub aud: Option<String>,
}

/// A bearer token for the management API
#[derive(Debug)]
pub struct AccessToken {
    raw: SecretString,
    claims: AccessTokenClaims,
}

impl Clone for AccessToken {
    fn clone(&self) -> Self {
        Self {
            raw: SecretString::from(self.raw.expose_secret().to_string()),
            claims: self.claims.clone(),
        }
    }
}

impl AccessToken {
    /// Create an access token from a raw JWT
    /// Note: This does NOT validate the signature, only decodes the claims
    pub fn from_jwt(raw: String) -> Result<Self, DeployError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;

        let token_data = decode::<AccessTokenClaims>(&raw, &DecodingKey::from_secret(b""), &validation)
            .map_err(|e| {
                DeployError::AuthenticationFailed(format!("Failed to decode access token: {}", e))
            })?;

        Ok(Self {
            raw: SecretString::from(raw),
            claims: token_data.claims,
        })
    }

    /// Create an access token whose lifetime is known from the issuing response
    pub fn with_lifetime(raw: String, expires_in_secs: i64) -> Self {
        Self {
            raw: SecretString::from(raw),
            claims: AccessTokenClaims {
                exp: Utc::now().timestamp() + expires_in_secs,
                tid: None,
                oid: None,
                aud: None,
            },
        }
    }

    /// Accept any token string: JWT claims when readable, a default lifetime otherwise
    pub fn from_raw(raw: String) -> Self {
        if raw.split('.').count() == 3 {
            if let Ok(token) = Self::from_jwt(raw.clone()) {
                return token;
            }
        }
        Self::with_lifetime(raw, OPAQUE_TOKEN_LIFETIME_SECS)
    }

    pub fn secret(&self) -> &SecretString {
        &self.raw
    }

    /// Value of the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.raw.expose_secret())
    }

    pub fn claims(&self) -> &AccessTokenClaims {
        &self.claims
    }

    /// Tenant the token was issued for
    pub fn tenant_id(&self) -> Option<&str> {
        self.claims.tid.as_deref()
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.claims.exp < Utc::now().timestamp()
    }

    /// Check if the token expires within the given duration
    pub fn expires_within(&self, seconds: i64) -> bool {
        self.claims.exp < Utc::now().timestamp() + seconds
    }

    /// Get expiration time
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.claims.exp, 0).unwrap_or_else(Utc::now)
    }
}
