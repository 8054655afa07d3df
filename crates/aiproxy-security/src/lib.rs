//! # AI Proxy Security
//!
//! Bearer token verification against third-party identity providers and
//! static service credentials for backend callers.

pub mod error;
pub mod issuer;
pub mod key_cache;
pub mod key_document;
pub mod service_credentials;
pub mod verifier;

pub use error::AuthError;
pub use issuer::{Issuer, IssuerKind, IssuerRegistry};
pub use key_cache::KeyCache;
pub use service_credentials::ServiceCredentials;
pub use verifier::{CredentialVerifier, VerifiedIdentity};
