use axum::{extract::State, Json};
use serde_json::{json, Value};

use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::NlpRequest;
use crate::services::NlpSchedulingService;

#[axum::debug_handler]
pub async fn parse_request(
    State(state): State<AppState>,
    Json(request): Json<NlpRequest>,
) -> Result<Json<Value>, AppError> {
    let service = NlpSchedulingService::from_state(&state);
    let parsed = service.parse(&request.request_text, &request.user_id).await?;
    let message = if parsed.success {
        "Request parsed successfully"
    } else {
        "Could not fully parse request"
    };
    Ok(Json(json!({
        "message": message,
        "parse_result": parsed,
    })))
}

#[axum::debug_handler]
pub async fn execute_request(
    State(state): State<AppState>,
    Json(request): Json<NlpRequest>,
) -> Result<Json<Value>, AppError> {
    let service = NlpSchedulingService::from_state(&state);
    let parsed = service.parse(&request.request_text, &request.user_id).await?;
    if !parsed.success {
        return Err(AppError::BadRequest(
            parsed
                .clarification_needed
                .unwrap_or_else(|| "Unable to understand the scheduling request".to_string()),
        ));
    }

    let outcome = service.execute(&parsed, &request.user_id).await?;
    Ok(Json(json!({
        "message": "Request executed successfully",
        "parse_result": parsed,
        "result": outcome,
    })))
}
