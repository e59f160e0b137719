use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{ActivePatternQuery, DetectionRequest, TransitionRequest};
use crate::services::PatternService;

#[axum::debug_handler]
pub async fn detect_patterns(
    State(state): State<AppState>,
    Json(request): Json<DetectionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatternService::from_state(&state);
    let run = service.detect(request.start_date, request.end_date).await?;
    Ok(Json(json!(run)))
}

#[axum::debug_handler]
pub async fn list_active_patterns(
    State(state): State<AppState>,
    Query(query): Query<ActivePatternQuery>,
) -> Result<Json<Value>, AppError> {
    let service = PatternService::from_state(&state);
    let patterns = service.active_patterns(query.severity, query.category).await?;
    Ok(Json(json!({
        "patterns": patterns,
        "count": patterns.len(),
    })))
}

#[axum::debug_handler]
pub async fn get_pattern(
    State(state): State<AppState>,
    Path(pattern_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = PatternService::from_state(&state);
    let pattern = service.get_pattern(pattern_id).await?;
    Ok(Json(json!(pattern)))
}

#[axum::debug_handler]
pub async fn resolve_pattern(
    State(state): State<AppState>,
    Path(pattern_id): Path<Uuid>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatternService::from_state(&state);
    let pattern = service.resolve(pattern_id, body.note).await?;
    Ok(Json(json!(pattern)))
}

#[axum::debug_handler]
pub async fn ignore_pattern(
    State(state): State<AppState>,
    Path(pattern_id): Path<Uuid>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatternService::from_state(&state);
    let pattern = service.ignore(pattern_id, body.note).await?;
    Ok(Json(json!(pattern)))
}

#[axum::debug_handler]
pub async fn get_pattern_statistics(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let service = PatternService::from_state(&state);
    let stats = service.statistics().await?;
    Ok(Json(json!(stats)))
}
