use axum::{
    routing::{get, post},
    Router,
};

use shared_utils::AppState;

use crate::handlers;

pub fn suggestion_routes(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::generate_suggestions))
        .route("/stats", get(handlers::get_suggestion_stats))
        .route("/clients/{client_id}/history", get(handlers::get_suggestion_history))
        .route("/{suggestion_id}", get(handlers::get_suggestion))
        .route("/{suggestion_id}/accept", post(handlers::accept_suggestion))
        .with_state(state)
}
