//! Request authentication layers

pub mod auth;

pub use auth::{bearer_auth, service_auth, ServiceName, SERVICE_HEADER};
