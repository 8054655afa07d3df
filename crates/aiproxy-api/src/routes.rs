use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::handlers::{health, prompt, users};
use crate::middleware::{bearer_auth, service_auth};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/v1/users/me", get(users::me))
        .route("/v1/prompt", post(prompt::prompt))
        .route("/v1/prompt/new", post(prompt::new_conversation))
        .route_layer(middleware::from_fn_with_state(state.clone(), bearer_auth));

    let service_routes = Router::new()
        .route("/v1/prompt/internal", post(prompt::internal_prompt))
        .route_layer(middleware::from_fn_with_state(state.clone(), service_auth));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(user_routes)
        .merge(service_routes)
        .with_state(state)
}
