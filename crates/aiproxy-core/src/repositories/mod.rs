//! Repository traits (ports)

pub mod cache_repository;
pub mod conversation_repository;

pub use cache_repository::{CacheError, CacheStore, Expiry};
pub use conversation_repository::{ConversationStore, StoreError};
