use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use validator::ValidationErrors;

use aiproxy_core::EngineError;
use aiproxy_security::AuthError;

use crate::response::ApiResponse;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error("Missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) | ApiError::MissingCredentials(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(err) => match err {
                EngineError::QuotaExceeded { .. } | EngineError::UpstreamRateLimited => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                EngineError::CompletionBackend(_) => StatusCode::BAD_GATEWAY,
                EngineError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
                EngineError::CacheUnavailable(_) | EngineError::PersistenceFailure(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                EngineError::CorruptCacheEntry { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut retry_after = None;

        let message = match &self {
            ApiError::Unauthorized(cause) => {
                tracing::warn!("Unauthorized: {:?}", cause);
                "Unauthorized".to_string()
            }
            ApiError::MissingCredentials(what) => {
                tracing::warn!("Missing credentials: {}", what);
                "Unauthorized".to_string()
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!("Bad request: {}", msg);
                msg.clone()
            }
            ApiError::Validation(errors) => {
                tracing::warn!("Validation failed: {}", errors);
                errors.to_string()
            }
            ApiError::Engine(err) => {
                match err {
                    EngineError::QuotaExceeded { retry_after: after, .. } => {
                        tracing::info!("Quota exceeded: {}", err);
                        retry_after = Some(after.as_secs());
                    }
                    EngineError::UpstreamRateLimited => tracing::warn!("{}", err),
                    _ => tracing::error!("Engine error: {:?}", err),
                }
                match err {
                    EngineError::QuotaExceeded { .. } | EngineError::UpstreamRateLimited => err.to_string(),
                    EngineError::CompletionBackend(_) => "Completion backend error".to_string(),
                    EngineError::DeadlineExceeded(_) => "Request timed out".to_string(),
                    EngineError::CacheUnavailable(_) | EngineError::PersistenceFailure(_) => {
                        "Service temporarily unavailable".to_string()
                    }
                    EngineError::CorruptCacheEntry { .. } => "Internal error".to_string(),
                }
            }
        };

        let mut response = (status, Json(ApiResponse::message(status, message))).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
