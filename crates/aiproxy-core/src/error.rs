//! Engine errors

use std::time::Duration;

use thiserror::Error;

use crate::repositories::{CacheError, StoreError};
use crate::services::CompletionError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Token usage limit reached: {used} token, your limit resets after {}s", .retry_after.as_secs())]
    QuotaExceeded { used: u64, retry_after: Duration },

    #[error("Rate limited by upstream, please retry later")]
    UpstreamRateLimited,

    #[error("Completion backend error")]
    CompletionBackend(#[source] CompletionError),

    #[error("Cache unavailable")]
    CacheUnavailable(#[from] CacheError),

    #[error("Corrupt cache entry {key}: {reason}")]
    CorruptCacheEntry { key: String, reason: String },

    #[error("Persistence failure")]
    PersistenceFailure(#[from] StoreError),

    #[error("Turn exceeded deadline of {}s", .0.as_secs())]
    DeadlineExceeded(Duration),
}

impl From<CompletionError> for EngineError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::RateLimited => EngineError::UpstreamRateLimited,
            other => EngineError::CompletionBackend(other),
        }
    }
}
