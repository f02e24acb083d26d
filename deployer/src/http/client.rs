//! HTTP client for the Azure Resource Manager API

use std::time::Duration;

use reqwest::{header, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::platform::PlatformError;

/// Public Azure cloud management host
pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";

/// API version of the Machine Learning Services resource provider
pub const DEFAULT_API_VERSION: &str = "2023-10-01";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Body of a create-or-update call plus where to follow it up
#[derive(Debug)]
pub struct ArmResponse<T> {
    pub body: T,
    /// `Azure-AsyncOperation` or `Location` header, when the platform
    /// continues the work asynchronously
    pub operation_url: Option<String>,
}

/// Raw result of querying an operation URL
#[derive(Debug)]
pub struct OperationResponse {
    pub status: StatusCode,
    pub body: String,
}

/// HTTP client for management-plane calls
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_version: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
        })
    }

    /// Override the resource provider API version
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    fn url(&self, path: &str) -> String {
        let separator = if path.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}api-version={}",
            self.base_url, path, separator, self.api_version
        )
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        authorization: &str,
    ) -> Result<T, PlatformError> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, authorization)
            .header("x-ms-client-request-id", Uuid::new_v4().to_string())
            .send()
            .await?;

        let (_, body) = Self::handle_response(response).await?;
        Ok(body)
    }

    /// Make a PUT request, keeping the operation header of async responses
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        authorization: &str,
        body: &B,
    ) -> Result<ArmResponse<T>, PlatformError> {
        let url = self.url(path);
        debug!("PUT {}", url);

        let response = self
            .client
            .put(&url)
            .header(header::AUTHORIZATION, authorization)
            .header("x-ms-client-request-id", Uuid::new_v4().to_string())
            .json(body)
            .send()
            .await?;

        let (operation_url, body) = Self::handle_response(response).await?;
        Ok(ArmResponse {
            body,
            operation_url,
        })
    }

    /// Make a POST request without a body
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        authorization: &str,
    ) -> Result<T, PlatformError> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, authorization)
            .header(header::CONTENT_LENGTH, 0)
            .header("x-ms-client-request-id", Uuid::new_v4().to_string())
            .send()
            .await?;

        let (_, body) = Self::handle_response(response).await?;
        Ok(body)
    }

    /// Query an absolute operation URL handed out by the platform
    ///
    /// `202 Accepted` is a valid answer here, so the status is returned as-is
    /// for anything that is not an error.
    pub async fn get_operation(
        &self,
        url: &str,
        authorization: &str,
    ) -> Result<OperationResponse, PlatformError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status.is_success() {
            return Ok(OperationResponse { status, body });
        }
        Err(Self::classify(status, body))
    }

    async fn handle_response<T: DeserializeOwned>(
        response: Response,
    ) -> Result<(Option<String>, T), PlatformError> {
        let status = response.status();
        let operation_url = operation_url(&response);
        let text = response.text().await?;

        if !status.is_success() {
            return Err(Self::classify(status, text));
        }

        let body = serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, body = %text, "Failed to parse response");
            PlatformError::Serialization(e)
        })?;
        Ok((operation_url, body))
    }

    fn classify(status: StatusCode, body: String) -> PlatformError {
        match status {
            StatusCode::NOT_FOUND => PlatformError::NotFound(body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Unauthorized(body),
            _ => {
                error!("HTTP request failed: {} - {}", status, body);
                PlatformError::Api {
                    status: status.as_u16(),
                    message: body,
                }
            }
        }
    }
}

fn operation_url(response: &Response) -> Option<String> {
    let headers = response.headers();
    headers
        .get(ASYNC_OPERATION_HEADER)
        .or_else(|| {
            if response.status() == StatusCode::ACCEPTED {
                headers.get(header::LOCATION)
            } else {
                None
            }
        })
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
