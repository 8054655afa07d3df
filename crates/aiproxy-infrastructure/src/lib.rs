//! # AI Proxy Infrastructure
//!
//! Adapters for the core ports: Redis cache, PostgreSQL conversation store,
//! and the HTTP completion backend.

pub mod cache;
pub mod completion;
pub mod database;

pub use cache::{create_redis_pool, RedisCache};
pub use completion::HttpCompletionBackend;
pub use database::{create_pool, run_migrations, PgConversationStore};
