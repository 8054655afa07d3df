use axum::{extract::State, Extension, Json};

use aiproxy_security::VerifiedIdentity;

use crate::dto::ProfileResponse;
use crate::error::ApiError;
use crate::handlers::caller_email;
use crate::response::ApiResponse;
use crate::state::AppState;

/// GET /v1/users/me
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<VerifiedIdentity>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let usage = state.engine.get_usage(caller_email(&identity)?).await?;
    Ok(Json(ApiResponse::success(ProfileResponse { identity, usage })))
}
