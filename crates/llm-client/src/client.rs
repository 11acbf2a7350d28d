//! Chat completion HTTP client.

use crate::error::LlmError;
use crate::provider::ChatProvider;
use crate::types::*;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

/// Default retry configuration
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;
const DEFAULT_MAX_BACKOFF_MS: u64 = 5000;

/// Chat completion provider client.
///
/// The API key is stored using `SecretString` to prevent accidental
/// exposure in logs or debug output.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl LlmClient {
    /// Create a new provider client.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: SecretString::new(api_key.into()),
            model: model.into(),
        })
    }

    /// Get the configured model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check the provider is configured before any call is attempted.
    pub fn validate_api_key(&self) -> Result<(), LlmError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(LlmError::Misconfigured("API key is not set".into()));
        }
        Ok(())
    }

    /// Send a chat completion request.
    #[instrument(skip(self, messages), fields(message_count = messages.len()))]
    pub async fn complete(&self, messages: Vec<Message>) -> Result<Completion, LlmError> {
        self.validate_api_key()?;

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(0.7),
            max_tokens: None,
            stream: Some(false),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let chat_response = self.handle_response::<ChatResponse>(response).await?;
        let usage = chat_response.usage;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .map(|content| Completion { content, usage })
            .ok_or(LlmError::EmptyResponse)
    }

    /// Send a chat completion request with automatic retry and
    /// exponential backoff.
    ///
    /// Retries on transient errors (network issues, rate limits) up to
    /// `max_retries` times. Does not retry on authentication errors,
    /// misconfiguration or empty responses.
    #[instrument(skip(self, messages), fields(message_count = messages.len()))]
    pub async fn complete_with_retry(
        &self,
        messages: Vec<Message>,
        max_retries: Option<u32>,
    ) -> Result<Completion, LlmError> {
        let max_retries = max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        let mut backoff_ms = DEFAULT_INITIAL_BACKOFF_MS;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} after {}ms backoff", attempt, backoff_ms);
                sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(DEFAULT_MAX_BACKOFF_MS);
            }

            match self.complete(messages.clone()).await {
                Ok(completion) => return Ok(completion),
                Err(LlmError::Unauthorized) => return Err(LlmError::Unauthorized),
                Err(LlmError::EmptyResponse) => return Err(LlmError::EmptyResponse),
                Err(e @ LlmError::Misconfigured(_)) => return Err(e),
                Err(e) => {
                    warn!("Completion request failed (attempt {}): {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(LlmError::Api {
            status: 0,
            message: "Max retries exceeded".into(),
        }))
    }

    /// Health check - returns true if the API is reachable.
    pub async fn health_check(&self) -> bool {
        let Ok(response) = self
            .client
            .get(format!("{}/models", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .send()
            .await
        else {
            return false;
        };
        response.status().is_success()
    }

    /// Handle HTTP response, converting errors appropriately.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, LlmError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            // Truncate on a char boundary; bodies are UTF-8 and may hold
            // multibyte text anywhere.
            debug!(
                "Response body: {}",
                body.chars().take(200).collect::<String>()
            );
            serde_json::from_str(&body).map_err(LlmError::from)
        } else {
            Err(self.extract_error(response).await)
        }
    }

    /// Extract error information from a failed response.
    async fn extract_error(&self, response: reqwest::Response) -> LlmError {
        let status = response.status();

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("Rate limit exceeded");
                LlmError::RateLimit
            }
            StatusCode::UNAUTHORIZED => {
                warn!("Authentication failed");
                LlmError::Unauthorized
            }
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".into());
                LlmError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

#[async_trait]
impl ChatProvider for LlmClient {
    fn validate_api_key(&self) -> Result<(), LlmError> {
        LlmClient::validate_api_key(self)
    }

    async fn complete(&self, messages: Vec<Message>) -> Result<Completion, LlmError> {
        self.complete_with_retry(messages, None).await
    }
}
