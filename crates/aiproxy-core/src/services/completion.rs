//! Completion backend port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CompletionRequest, CompletionResponse};

#[derive(Error, Debug)]
pub enum CompletionError {
    /// Upstream answered 429. Distinct from the gateway's own quota.
    #[error("Completion backend rate limit reached")]
    RateLimited,

    #[error("Completion backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Completion request failed: {0}")]
    Transport(String),

    #[error("Invalid completion response: {0}")]
    Decode(String),

    #[error("Completion response has no choices")]
    EmptyChoices,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, CompletionError>;
}
