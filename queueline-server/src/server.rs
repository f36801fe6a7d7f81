//! Axum router setup.

use crate::config::ServerConfig;
use crate::handlers::{auth, backup, cleanup, AppState};
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let api = Router::new()
        .route("/queue-auth.json", get(auth::get_collection))
        .route("/api/save-auth", post(auth::save_auth))
        .route("/api/delete-queue-auth", delete(auth::delete_queue_auth))
        .route("/api/delete-auth", delete(auth::delete_auth))
        .route("/api/save-queue-backup", post(backup::save_queue_backup))
        .route(
            "/api/get-queue-backup/{queueName}",
            get(backup::get_queue_backup),
        )
        .route(
            "/api/delete-queue-backup/{queueName}",
            delete(backup::delete_queue_backup),
        )
        .route("/api/manual-cleanup", post(cleanup::manual_cleanup))
        .route("/api/cleanup-status", get(cleanup::cleanup_status))
        .with_state(state);

    // Everything else is static, falling back to the landing document.
    let static_files = ServeDir::new(&config.static_dir)
        .not_found_service(ServeFile::new(config.landing_path()));

    api.fallback_service(static_files)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.max_payload_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleanup::CleanupHandle;
    use crate::storage::DocumentStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use queueline_core::QueueState;
    use tower::ServiceExt;

    fn test_router(dir: &std::path::Path) -> Router {
        let store = DocumentStore::open(dir).unwrap();
        let cleanup = CleanupHandle::new(store.clone(), 86_400, 86_400);
        let config = ServerConfig {
            data_dir: dir.to_path_buf(),
            static_dir: dir.join("public"),
            ..ServerConfig::default()
        };
        std::fs::create_dir_all(dir.join("public")).unwrap();
        build_router(AppState { store, cleanup }, &config)
    }

    #[tokio::test]
    async fn backup_save_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let body = serde_json::json!({
            "queueName": "Clinic-A",
            "data": QueueState::new("Clinic-A"),
        });
        let response = app
            .clone()
            .oneshot(
                Request::post("/api/save-queue-backup")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/get-queue-backup/Clinic-A")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api/get-queue-backup/Clinic-B")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_backup_body_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let body = serde_json::json!({
            "queueName": "Clinic-A",
            "data": { "tickets": "not-a-list" },
        });
        let response = app
            .oneshot(
                Request::post("/api/save-queue-backup")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_collection_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let response = app
            .oneshot(
                Request::get("/queue-auth.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cleanup_status_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_router(dir.path());

        let response = app
            .oneshot(
                Request::get("/api/cleanup-status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
