//! Application services

pub mod audit;
pub mod completion;
pub mod conversation_engine;

pub use audit::AuditWriter;
pub use completion::{CompletionBackend, CompletionError};
pub use conversation_engine::{ConversationEngine, EngineConfig};
