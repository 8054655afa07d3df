//! Key-value cache port

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Expiry applied by [`CacheStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// No expiry. Clears any expiry the key had.
    Never,
    /// Keep whatever expiry the key already has. A fresh key gets none.
    KeepExisting,
    After(Duration),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache connection error: {0}")]
    Connection(String),

    #[error("Cache command failed: {0}")]
    Command(String),
}

/// Misses are `Ok(None)`, never errors.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, expiry: Expiry) -> Result<(), CacheError>;
    /// Remaining lifetime. `None` when the key is missing or never expires.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;
    /// Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}
