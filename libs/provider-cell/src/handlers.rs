use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::services::{CompatibilityService, LoadBalancingService};

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

// ==============================================================================
// COMPATIBILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn score_compatibility(
    State(state): State<AppState>,
    Path((provider_id, client_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let service = CompatibilityService::from_state(&state);
    let result = service.score(provider_id, client_id).await?;
    Ok(Json(json!(result)))
}

#[axum::debug_handler]
pub async fn get_cached_compatibility(
    State(state): State<AppState>,
    Path((provider_id, client_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let service = CompatibilityService::from_state(&state);
    match service.cached_score(provider_id, client_id).await? {
        Some(score) => Ok(Json(json!(score))),
        None => Err(AppError::NotFound(format!(
            "No compatibility score for provider {} and client {}",
            provider_id, client_id
        ))),
    }
}

#[axum::debug_handler]
pub async fn top_compatible_providers(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, AppError> {
    let service = CompatibilityService::from_state(&state);
    let result = service
        .top_compatible_providers(client_id, query.limit.unwrap_or(5))
        .await?;
    Ok(Json(json!(result)))
}

// ==============================================================================
// LOAD BALANCING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_provider_load(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = LoadBalancingService::from_state(&state);
    let metrics = service.provider_load(provider_id).await?;
    Ok(Json(json!(metrics)))
}

#[axum::debug_handler]
pub async fn get_load_adjustment(
    State(state): State<AppState>,
    Path(provider_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = LoadBalancingService::from_state(&state);
    let multiplier = service.load_balancing_adjustment(provider_id).await;
    Ok(Json(json!({
        "provider_id": provider_id,
        "multiplier": multiplier
    })))
}

#[axum::debug_handler]
pub async fn get_team_distribution(
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let service = LoadBalancingService::from_state(&state);
    let distribution = service.team_distribution().await?;
    Ok(Json(json!(distribution)))
}

#[axum::debug_handler]
pub async fn get_load_recommendations(
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let service = LoadBalancingService::from_state(&state);
    let recommendations = service.recommendations().await?;
    Ok(Json(json!({
        "recommendations": recommendations,
        "count": recommendations.len()
    })))
}

#[axum::debug_handler]
pub async fn get_providers_by_capacity(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, AppError> {
    let service = LoadBalancingService::from_state(&state);
    let providers = service.providers_by_capacity(query.limit.unwrap_or(10)).await?;
    Ok(Json(json!(providers)))
}
