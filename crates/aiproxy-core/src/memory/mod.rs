//! In-process adapters for the cache and conversation store ports

pub mod cache;
pub mod conversation_store;

pub use cache::MemoryCache;
pub use conversation_store::MemoryConversationStore;
