//! API route handlers for the larder server.

pub mod health;
pub mod imports;
pub mod metrics;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET  /api/health - Health check
/// - POST /api/imports - Upload a file and start an import
/// - GET  /api/imports/{id} - Import job snapshot
/// - POST /api/imports/{id}/cancel - Request cancellation
/// - GET  /api/metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", imports::router())
        .nest("/api", metrics::router())
        .with_state(state)
}
