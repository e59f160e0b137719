use axum::{routing::get, Router};

use nlp_cell::router::nlp_routes;
use pattern_cell::router::pattern_routes;
use provider_cell::router::{compatibility_routes, load_routes};
use scheduling_cell::router::suggestion_routes;
use shared_utils::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Practice scheduling API is running!" }))
        .nest("/compatibility", compatibility_routes(state.clone()))
        .nest("/load", load_routes(state.clone()))
        .nest("/suggestions", suggestion_routes(state.clone()))
        .nest("/patterns", pattern_routes(state.clone()))
        .nest("/nlp", nlp_routes(state))
}
