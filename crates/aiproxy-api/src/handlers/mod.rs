//! HTTP handlers

pub mod health;
pub mod prompt;
pub mod users;

use aiproxy_security::VerifiedIdentity;

use crate::error::ApiError;

/// Cache and quota key of a bearer caller. Tokens without an address are refused.
pub(crate) fn caller_email(identity: &VerifiedIdentity) -> Result<&str, ApiError> {
    if identity.email.is_empty() {
        return Err(ApiError::BadRequest("token carries no email claim".to_string()));
    }
    Ok(&identity.email)
}
