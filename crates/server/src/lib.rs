// crates/server/src/lib.rs
//! Larder server library.
//!
//! Axum HTTP server for asynchronous recipe imports: uploads are validated,
//! stored as jobs, and processed page by page in the background while clients
//! poll for progress.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractor;
pub mod jobs;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::{Caller, CALLER_HEADER};
pub use config::{ConfigError, ServerConfig};
pub use error::*;
pub use extractor::HttpRecipeExtractor;
pub use jobs::ImportRunner;
pub use metrics::{init_metrics, render_metrics};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use larder_db::{Database, DbResult, RecoveredJobs};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::routes::imports::UPLOAD_BODY_LIMIT;

/// Error recorded on jobs found unfinished at startup.
pub const INTERRUPTED_MESSAGE: &str = "Import interrupted by server restart";

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, imports, metrics)
/// - CORS (allows any origin)
/// - Request body limit sized for the largest accepted upload
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(RequestBodyLimitLayer::new(UPLOAD_BODY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Settle jobs a previous process left unfinished.
///
/// Nothing is processing them any more, so without this their clients would
/// poll until their own timeout. Must run before the server accepts requests.
pub async fn recover_interrupted_jobs(db: &Database) -> DbResult<RecoveredJobs> {
    let recovered = db.fail_interrupted_jobs(INTERRUPTED_MESSAGE).await?;
    if recovered.failed > 0 || recovered.cancelled > 0 {
        tracing::warn!(
            failed = recovered.failed,
            cancelled = recovered.cancelled,
            "Settled import jobs interrupted by restart"
        );
    }
    Ok(recovered)
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use larder_core::{MockExtractor, SourceDocument};
    use larder_db::NewImportJob;
    use larder_types::{JobStatus, SourceKind};
    use tower::ServiceExt;

    async fn test_app() -> Router {
        let db = Database::new_in_memory().await.expect("in-memory DB");
        create_app(AppState::new(db, Arc::new(MockExtractor::new(Vec::new()))))
    }

    /// Helper to make a GET request to the app.
    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body_str = String::from_utf8(body.to_vec()).unwrap();

        (status, body_str)
    }

    // ========================================================================
    // Health Endpoint Tests
    // ========================================================================

    #[tokio::test]
    async fn test_health_endpoint_response_structure() {
        let (status, body) = get(test_app().await, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["uptime_secs"].is_number());
        assert_eq!(json["extractor"], "mock");
        assert_eq!(json["active_imports"], 0);
    }

    // ========================================================================
    // CORS Tests
    // ========================================================================

    #[tokio::test]
    async fn test_cors_allows_any_origin() {
        let response = test_app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("Origin", "http://example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let allow_origin = response.headers().get("access-control-allow-origin");
        assert_eq!(allow_origin.unwrap(), "*");
    }

    // ========================================================================
    // 404 Tests
    // ========================================================================

    #[tokio::test]
    async fn test_404_for_unknown_route() {
        let (status, _body) = get(test_app().await, "/api/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_404_for_non_api_path() {
        let (status, _body) = get(test_app().await, "/health").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ========================================================================
    // Body limit
    // ========================================================================

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let response = test_app()
            .await
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/imports")
                    .header(CALLER_HEADER, "alice")
                    .header("content-type", "multipart/form-data; boundary=x")
                    .header("content-length", (UPLOAD_BODY_LIMIT + 1).to_string())
                    .body(Body::from(vec![0u8; UPLOAD_BODY_LIMIT + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    // ========================================================================
    // Startup recovery
    // ========================================================================

    #[tokio::test]
    async fn test_recover_interrupted_jobs() {
        let db = Database::new_in_memory().await.unwrap();
        let job = db
            .create_import_job(&NewImportJob {
                owner: "alice",
                source_kind: SourceKind::Document,
                content_type: "application/pdf",
                file_name: None,
                bytes: b"%PDF",
            })
            .await
            .unwrap();

        let recovered = recover_interrupted_jobs(&db).await.unwrap();
        assert_eq!(recovered.failed, 1);

        let job = db.get_import_job("alice", &job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(INTERRUPTED_MESSAGE));

        // A second pass finds nothing.
        let again = recover_interrupted_jobs(&db).await.unwrap();
        assert_eq!((again.failed, again.cancelled), (0, 0));

        // Source bytes are still there for inspection.
        let source: Option<SourceDocument> = db.load_source(&job.id).await.unwrap();
        assert!(source.is_some());
    }
}
