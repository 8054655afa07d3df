//! Authentication errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Unsupported credential format")]
    UnsupportedCredentialFormat,

    #[error("Issuer not recognized: {0}")]
    UnrecognizedIssuer(String),

    #[error("Unexpected signing method: {0}")]
    UnexpectedSigningMethod(String),

    #[error("Public key not found for kid: {0}")]
    KeyNotFound(String),

    #[error("Key document unavailable: {0}")]
    KeyDocumentUnavailable(String),

    #[error("Signature verification failed")]
    SignatureInvalid(#[source] jsonwebtoken::errors::Error),

    #[error("Invalid audience")]
    AudienceMismatch,

    #[error("Service not allowed: {0}")]
    UnknownService(String),

    #[error("Invalid service credential")]
    InvalidCredential,
}
