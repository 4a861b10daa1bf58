// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use larder_core::RecipeExtractor;
use larder_db::Database;

use crate::jobs::ImportRunner;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Job store.
    pub db: Database,
    /// Background processors for import jobs.
    pub runner: Arc<ImportRunner>,
    /// Extract single images inline when the request does not say.
    pub image_fast_path: bool,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(db: Database, extractor: Arc<dyn RecipeExtractor>) -> Arc<Self> {
        Self::with_fast_path(db, extractor, false)
    }

    pub fn with_fast_path(
        db: Database,
        extractor: Arc<dyn RecipeExtractor>,
        image_fast_path: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            runner: Arc::new(ImportRunner::new(db.clone(), extractor)),
            db,
            image_fast_path,
        })
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::MockExtractor;

    #[tokio::test]
    async fn test_new_state() {
        let db = Database::new_in_memory().await.unwrap();
        let state = AppState::new(db, Arc::new(MockExtractor::new(Vec::new())));

        assert!(state.uptime_secs() < 2);
        assert!(!state.image_fast_path);
        assert_eq!(state.runner.active_count(), 0);
        assert_eq!(state.runner.extractor_name(), "mock");
    }
}
