//! Streaming chat-completion client for a deployed endpoint

use std::time::Duration;

use chat_protocol::{ChatCompletionRequest, ChatMessage, ErrorResponse};
use futures::StreamExt;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};

use crate::chat::stream::{chat_events, SseEvent};
use crate::errors::DeployError;
use crate::models::credentials::ClientConfig;

/// Generation time allowed for one completion
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Options of the validation chat sent after a deployment
#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful Assistant".to_string(),
            user_prompt: "write a python code to read csv".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
        }
    }
}

/// Client for the endpoint's OpenAI-compatible API
pub struct ChatClient {
    client: Client,
    completions_url: String,
    api_key: SecretString,
    model: String,
}

impl ChatClient {
    pub fn new(config: &ClientConfig) -> Result<Self, DeployError> {
        if config.scoring_url.trim().is_empty() {
            return Err(DeployError::ChatError("scoring URL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            completions_url: format!(
                "{}/chat/completions",
                config.scoring_url.trim_end_matches('/')
            ),
            api_key: SecretString::from(config.api_key.expose_secret().to_string()),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Streaming request for this client's model
    pub fn request(&self, options: &ChatOptions) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(options.system_prompt.clone()),
                ChatMessage::user(options.user_prompt.clone()),
            ],
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_tokens),
            stream: true,
        }
    }

    /// Send a streaming completion, forwarding every content delta
    ///
    /// Returns the accumulated text once the `[DONE]` marker arrives.
    pub async fn stream_chat(
        &self,
        request: &ChatCompletionRequest,
        mut on_delta: impl FnMut(&str),
    ) -> Result<String, DeployError> {
        debug!("POST {}", self.completions_url);

        let response = self
            .client
            .post(&self.completions_url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header(header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!("Chat completion failed: {} - {}", status, message);
            return Err(DeployError::ChatError(format!("{}: {}", status, message)));
        }

        let events = chat_events(response.bytes_stream());
        tokio::pin!(events);
        let mut text = String::new();
        let mut chunks = 0usize;
        let mut done = false;

        while let Some(event) = events.next().await {
            match event? {
                SseEvent::Chunk(chunk) => {
                    chunks += 1;
                    if let Some(content) = chunk.content().filter(|c| !c.is_empty()) {
                        on_delta(content);
                        text.push_str(content);
                    }
                }
                SseEvent::Done => {
                    done = true;
                    break;
                }
            }
        }

        if !done {
            error!(chunks, "Chat completion stream ended before [DONE]");
            return Err(DeployError::ChatError(
                "stream ended before [DONE]".to_string(),
            ));
        }

        info!(chunks, chars = text.chars().count(), "Chat completion stream finished");
        Ok(text)
    }
}
