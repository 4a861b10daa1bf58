//! Prometheus metrics endpoint.
//!
//! Exposes import metrics in Prometheus text format at `GET /api/metrics`.

use std::sync::Arc;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::metrics::render_metrics;
use crate::state::AppState;

/// GET /api/metrics - Prometheus metrics endpoint.
///
/// Returns 503 Service Unavailable if metrics are not initialized.
pub async fn metrics_handler() -> Response {
    match render_metrics() {
        Some(output) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            output,
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized").into_response(),
    }
}

/// Create the metrics routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(metrics_handler))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use larder_core::{ExtractedRecipe, MockExtractor, PageOutcome};
    use larder_db::{Database, NewImportJob};
    use larder_types::SourceKind;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_scrape_reports_finished_imports() {
        crate::metrics::init_metrics();

        let db = Database::new_in_memory().await.unwrap();
        let extractor = MockExtractor::new(vec![
            PageOutcome::Recipe(ExtractedRecipe::titled("Colcannon")),
            PageOutcome::NoRecipe,
        ]);
        let state = AppState::new(db.clone(), Arc::new(extractor));
        let job = db
            .create_import_job(&NewImportJob {
                owner: "alice",
                source_kind: SourceKind::Document,
                content_type: "application/pdf",
                file_name: None,
                bytes: b"%PDF-1.7",
            })
            .await
            .unwrap();
        state.runner.run_to_completion(&job.id).await;

        let response = crate::create_app(state)
            .oneshot(Request::builder().uri("/api/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("import_pages_total{outcome=\"recipe\"}"));
        assert!(body.contains("import_pages_total{outcome=\"no_recipe\"}"));
        assert!(body.contains("import_jobs_total{status=\"completed\"}"));
    }
}
