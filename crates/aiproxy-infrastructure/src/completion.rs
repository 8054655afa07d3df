//! HTTP completion backend (Azure OpenAI compatible chat completions)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};

use aiproxy_core::domain::{CompletionRequest, CompletionResponse};
use aiproxy_core::services::{CompletionBackend, CompletionError};
use aiproxy_shared::config::OpenAiSettings;

#[derive(Clone)]
pub struct HttpCompletionBackend {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpCompletionBackend {
    pub fn new(settings: &OpenAiSettings) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| CompletionError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: settings.url.clone(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, CompletionError> {
        debug!("Sending completion request with {} messages", request.messages.len());

        let response = self
            .client
            .post(&self.url)
            .header("Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Completion request failed: {}", e);
                CompletionError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            warn!("Completion backend rate limited: {}", body);
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Completion backend error: {} - {}", status, body);
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        if completion.choices.is_empty() {
            return Err(CompletionError::EmptyChoices);
        }
        Ok(completion)
    }
}
