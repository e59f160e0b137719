use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{AcceptSuggestionRequest, SchedulingRequest};
use crate::services::SuggestionService;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[axum::debug_handler]
pub async fn generate_suggestions(
    State(state): State<AppState>,
    Json(request): Json<SchedulingRequest>,
) -> Result<Json<Value>, AppError> {
    let service = SuggestionService::from_state(&state);
    let generated = service.generate(&request).await?;
    Ok(Json(json!(generated)))
}

#[axum::debug_handler]
pub async fn get_suggestion(
    State(state): State<AppState>,
    Path(suggestion_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = SuggestionService::from_state(&state);
    let suggestion = service.get_suggestion(suggestion_id).await?;
    Ok(Json(json!(suggestion)))
}

#[axum::debug_handler]
pub async fn accept_suggestion(
    State(state): State<AppState>,
    Path(suggestion_id): Path<Uuid>,
    Json(body): Json<AcceptSuggestionRequest>,
) -> Result<Json<Value>, AppError> {
    if body.accepted_by.trim().is_empty() {
        return Err(AppError::BadRequest("accepted_by is required".to_string()));
    }

    let service = SuggestionService::from_state(&state);
    let accepted = service.accept(suggestion_id, &body.accepted_by).await?;
    Ok(Json(json!(accepted)))
}

#[axum::debug_handler]
pub async fn get_suggestion_history(
    State(state): State<AppState>,
    Path(client_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, AppError> {
    let service = SuggestionService::from_state(&state);
    let history = service
        .history(client_id, query.limit.unwrap_or(20), query.offset.unwrap_or(0))
        .await?;
    Ok(Json(json!(history)))
}

#[axum::debug_handler]
pub async fn get_suggestion_stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let service = SuggestionService::from_state(&state);
    let stats = service.stats().await?;
    Ok(Json(json!(stats)))
}
