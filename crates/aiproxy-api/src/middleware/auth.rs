use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::debug;

use aiproxy_security::AuthError;

use crate::error::ApiError;
use crate::state::AppState;

pub const SERVICE_HEADER: &str = "x-service";

/// Authenticated backend service, inserted into request extensions by [`service_auth`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceName(pub String);

fn authorization<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::MissingCredentials("authorization header"))?;

    let (found, credential) = value
        .split_once(' ')
        .ok_or(ApiError::Unauthorized(AuthError::UnsupportedCredentialFormat))?;
    if !found.eq_ignore_ascii_case(scheme) {
        return Err(ApiError::Unauthorized(AuthError::UnsupportedCredentialFormat));
    }
    Ok(credential.trim())
}

/// Verifies `Authorization: Bearer` and stores the `VerifiedIdentity` in extensions.
pub async fn bearer_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = authorization(request.headers(), "Bearer")?;
    let identity = state.verifier.verify_bearer(token).await?;

    debug!(provider = %identity.provider, email = %identity.email, "Bearer verified");
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Verifies `Authorization: Basic` against the service named by `X-Service`.
pub async fn service_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let service = request
        .headers()
        .get(SERVICE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or(ApiError::MissingCredentials("x-service header"))?;

    let (username, password) = decode_basic(authorization(request.headers(), "Basic")?)?;
    state
        .verifier
        .verify_service_credential(&service, &username, &password)?;

    debug!(service = %service, "Service credential verified");
    request.extensions_mut().insert(ServiceName(service));
    Ok(next.run(request).await)
}

fn decode_basic(credential: &str) -> Result<(String, String), ApiError> {
    let decoded = STANDARD
        .decode(credential)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(ApiError::Unauthorized(AuthError::UnsupportedCredentialFormat))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(ApiError::Unauthorized(AuthError::UnsupportedCredentialFormat))?;
    Ok((username.to_string(), password.to_string()))
}
