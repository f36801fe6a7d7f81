//! Credential-collection endpoints.
//!
//! No HTTP-layer authentication: the server is a dumb mirror and the
//! actual gate is the client-side password handshake.

use super::AppState;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;
use queueline_core::CredentialCollection;
use serde::Deserialize;

/// `GET /queue-auth.json` -- the whole collection.
pub async fn get_collection(
    State(state): State<AppState>,
) -> Result<Json<CredentialCollection>, AppError> {
    let collection = state.store.load_auth()?;
    if collection.is_empty() && !state.store.auth_path().exists() {
        return Err(AppError::NotFound("No credential collection".to_string()));
    }
    Ok(Json(collection))
}

/// `POST /api/save-auth` -- overwrite the whole collection.
pub async fn save_auth(
    State(state): State<AppState>,
    Json(collection): Json<CredentialCollection>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.save_auth(&collection)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQueueAuthRequest {
    pub queue_name: String,
}

/// `DELETE /api/delete-queue-auth` -- remove one record; the file goes
/// away entirely when the collection becomes empty.
pub async fn delete_queue_auth(
    State(state): State<AppState>,
    Json(req): Json<DeleteQueueAuthRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = state.store.delete_queue_auth(&req.queue_name)?;
    Ok(Json(serde_json::json!({ "ok": true, "removed": removed })))
}

/// `DELETE /api/delete-auth` -- drop the whole collection.
pub async fn delete_auth(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.delete_auth()?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
