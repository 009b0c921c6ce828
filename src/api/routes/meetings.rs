//! Meeting lifecycle endpoints.
//!
//! - Starting a meeting (POST /meetings)
//! - Registering stored media for transcription or OCR (POST /meetings/:id/media)
//! - Ending a meeting (POST /meetings/:id/end)
//! - Inspecting a meeting's ledger entries (GET /meetings/:id)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::ApiState;
use crate::api::error::{ApiError, ApiResult};
use crate::pipeline::StageType;

#[derive(Debug, Deserialize)]
pub struct StartMeetingRequest {
    #[serde(alias = "notify_address")]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterMediaRequest {
    pub stage: String,
    pub file_path: String,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/meetings", post(start_meeting))
        .route("/meetings/:id", get(get_meeting))
        .route("/meetings/:id/end", post(end_meeting))
        .route("/meetings/:id/media", post(register_media))
        .with_state(state)
}

async fn start_meeting(
    State(state): State<ApiState>,
    Json(req): Json<StartMeetingRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let meeting_id = state.lifecycle.start(&req.email).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "meeting_id": meeting_id,
        })),
    ))
}

async fn register_media(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<RegisterMediaRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let stage = StageType::parse(&req.stage)
        .filter(StageType::is_media_stage)
        .ok_or_else(|| {
            ApiError::bad_request(format!(
                "stage must be transcription or ocr, got '{}'",
                req.stage
            ))
        })?;

    let task_id = state
        .lifecycle
        .register_media(&id, stage, &req.file_path)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "task_id": task_id,
        })),
    ))
}

async fn end_meeting(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    info!("End of meeting {} requested via API", id);
    let outcome = state.lifecycle.end(&id).await?;
    Ok(Json(json!({
        "success": true,
        "meeting_id": id,
        "dispatched": outcome.dispatched_stages(),
        "cascade_failures": outcome.failures,
    })))
}

async fn get_meeting(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let snapshot = state.lifecycle.snapshot(&id).await?;
    let value = serde_json::to_value(snapshot).map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(value))
}
