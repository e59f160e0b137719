use axum::{
    routing::{get, post},
    Router,
};

use shared_utils::AppState;

use crate::handlers;

pub fn pattern_routes(state: AppState) -> Router {
    Router::new()
        .route("/detect", post(handlers::detect_patterns))
        .route("/active", get(handlers::list_active_patterns))
        .route("/statistics", get(handlers::get_pattern_statistics))
        .route("/{pattern_id}", get(handlers::get_pattern))
        .route("/{pattern_id}/resolve", post(handlers::resolve_pattern))
        .route("/{pattern_id}/ignore", post(handlers::ignore_pattern))
        .with_state(state)
}
