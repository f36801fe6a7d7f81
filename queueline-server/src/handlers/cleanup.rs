//! Administrative sweep endpoints.

use super::AppState;
use crate::cleanup::CleanupStatus;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;

/// `POST /api/manual-cleanup` -- run the inactivity sweep immediately.
pub async fn manual_cleanup(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let removed = state.cleanup.run_once()?;
    Ok(Json(serde_json::json!({
        "ok": true,
        "removed": removed,
    })))
}

/// `GET /api/cleanup-status`.
pub async fn cleanup_status(State(state): State<AppState>) -> Json<CleanupStatus> {
    Json(state.cleanup.status())
}
