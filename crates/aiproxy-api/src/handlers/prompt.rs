use axum::{extract::State, http::StatusCode, Extension, Json};
use validator::Validate;

use aiproxy_security::VerifiedIdentity;

use crate::dto::{PromptRequest, PromptResponse, ServiceTurnDto};
use crate::error::ApiError;
use crate::handlers::caller_email;
use crate::middleware::ServiceName;
use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /v1/prompt
pub async fn prompt(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
    Json(payload): Json<PromptRequest>,
) -> Result<Json<ApiResponse<PromptResponse>>, ApiError> {
    payload.validate()?;
    let email = caller_email(&identity)?;

    let reply = state.engine.handle_user_turn(email, payload.content).await?;
    Ok(Json(ApiResponse::success(reply.into())))
}

/// POST /v1/prompt/new
pub async fn new_conversation(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.engine.clear_context(caller_email(&identity)?).await?;
    Ok(Json(ApiResponse::message(StatusCode::OK, "conversation cleared")))
}

/// POST /v1/prompt/internal
pub async fn internal_prompt(
    State(state): State<AppState>,
    Extension(ServiceName(service)): Extension<ServiceName>,
    Json(payload): Json<ServiceTurnDto>,
) -> Result<Json<ApiResponse<PromptResponse>>, ApiError> {
    payload.validate()?;

    let reply = state
        .engine
        .handle_service_turn(&service, payload.into())
        .await?;
    Ok(Json(ApiResponse::success(reply.into())))
}
