//! # AI Proxy Core
//!
//! Conversation engine, domain types, and the ports it drives: cache,
//! durable conversation store, and completion backend.

pub mod domain;
pub mod error;
pub mod memory;
pub mod repositories;
pub mod services;

pub use domain::*;
pub use error::EngineError;
pub use services::{AuditWriter, CompletionBackend, CompletionError, ConversationEngine, EngineConfig};
