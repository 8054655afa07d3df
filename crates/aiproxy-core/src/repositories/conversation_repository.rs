//! Durable conversation store port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AuditRecord, Conversation};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends to the user's most recently updated conversation, opening one if none exists.
    async fn append_exchange(&self, record: &AuditRecord) -> Result<(), StoreError>;
    async fn latest_conversation(&self, user_id: &str) -> Result<Option<Conversation>, StoreError>;
}
