use axum::{routing::post, Router};

use shared_utils::AppState;

use crate::handlers;

pub fn nlp_routes(state: AppState) -> Router {
    Router::new()
        .route("/parse", post(handlers::parse_request))
        .route("/execute", post(handlers::execute_request))
        .with_state(state)
}
