use axum::{routing::get, Router};

use shared_utils::AppState;

use crate::handlers;

pub fn compatibility_routes(state: AppState) -> Router {
    Router::new()
        .route("/top/{client_id}", get(handlers::top_compatible_providers))
        .route("/{provider_id}/{client_id}", get(handlers::score_compatibility))
        .route("/{provider_id}/{client_id}/cached", get(handlers::get_cached_compatibility))
        .with_state(state)
}

pub fn load_routes(state: AppState) -> Router {
    Router::new()
        .route("/team", get(handlers::get_team_distribution))
        .route("/recommendations", get(handlers::get_load_recommendations))
        .route("/capacity", get(handlers::get_providers_by_capacity))
        .route("/providers/{provider_id}", get(handlers::get_provider_load))
        .route("/providers/{provider_id}/adjustment", get(handlers::get_load_adjustment))
        .with_state(state)
}
