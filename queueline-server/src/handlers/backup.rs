//! Queue-state backup endpoints.

use super::AppState;
use crate::error::AppError;
use axum::extract::{Path, State};
use axum::Json;
use queueline_core::QueueState;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveBackupRequest {
    pub queue_name: String,
    /// The whole state document. Parsed into the typed form rather
    /// than stored blindly, so malformed documents are rejected here.
    pub data: serde_json::Value,
}

/// `POST /api/save-queue-backup` -- overwrite one queue's document.
pub async fn save_queue_backup(
    State(state): State<AppState>,
    Json(req): Json<SaveBackupRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let doc: QueueState = serde_json::from_value(req.data)
        .map_err(|e| AppError::BadRequest(format!("Invalid queue document: {}", e)))?;
    state.store.save_backup(&req.queue_name, doc)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `GET /api/get-queue-backup/{queueName}`.
pub async fn get_queue_backup(
    State(state): State<AppState>,
    Path(queue_name): Path<String>,
) -> Result<Json<QueueState>, AppError> {
    match state.store.load_backup(&queue_name)? {
        Some(doc) => Ok(Json(doc)),
        None => Err(AppError::NotFound(format!(
            "No backup for queue {}",
            queue_name
        ))),
    }
}

/// `DELETE /api/delete-queue-backup/{queueName}` -- a missing file is
/// "nothing to do", not a failure.
pub async fn delete_queue_backup(
    State(state): State<AppState>,
    Path(queue_name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.delete_backup(&queue_name)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
