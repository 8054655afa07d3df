//! Database module (PostgreSQL adapters)

pub mod connection;
pub mod conversation_repo_impl;

pub use connection::{create_pool, run_migrations};
pub use conversation_repo_impl::PgConversationStore;
