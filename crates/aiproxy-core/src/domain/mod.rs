//! Domain types

pub mod completion;
pub mod conversation;
pub mod message;
pub mod usage;

pub use completion::*;
pub use conversation::*;
pub use message::*;
pub use usage::*;
