// crates/server/src/jobs/runner.rs
//! Import runner: owns the lifecycle of every import job.
//!
//! One processor per job. Pages are attempted strictly in order and each
//! outcome is written to the store before the next page starts. The owner's
//! cancel request is observed before decomposition, before every page, and
//! once more before completing.

use std::sync::Arc;
use std::time::Instant;

use larder_core::{DecomposeError, PageOutcome, RecipeExtractor, SourceDocument};
use larder_db::{Database, DbError, DbResult};
use larder_types::{JobStatus, SourceKind};
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::state::{ActiveImports, ActiveJob};
use super::types::{InlineError, InlineResult};
use crate::metrics::{record_job_finished, record_page};

/// Failure message when decomposition yields nothing to extract.
pub const NO_PAGES_MESSAGE: &str = "Document has no pages";

/// Failure message when the store itself errors mid-job. Details go to the log.
pub const INTERNAL_FAILURE_MESSAGE: &str = "Import failed due to an internal error";

/// Spawns and drives import processors.
///
/// Thread-safe via `Arc` wrapping. Call `start` to process a job in the
/// background. Progress is read back from the store.
pub struct ImportRunner {
    db: Database,
    extractor: Arc<dyn RecipeExtractor>,
    active: ActiveImports,
}

impl ImportRunner {
    pub fn new(db: Database, extractor: Arc<dyn RecipeExtractor>) -> Self {
        Self {
            db,
            extractor,
            active: ActiveImports::new(),
        }
    }

    /// Process `job_id` on a background task.
    ///
    /// Returns false, without spawning, when a processor already owns the job.
    pub fn start(self: &Arc<Self>, job_id: &str) -> bool {
        let Some(claim) = self.active.claim(job_id) else {
            debug!(job_id, "Import already has a processor");
            return false;
        };
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.process(claim).await;
        });
        true
    }

    /// Process `job_id` on the current task and return its final status.
    ///
    /// `None` when another processor owns the job or the job does not exist.
    pub async fn run_to_completion(&self, job_id: &str) -> Option<JobStatus> {
        let claim = self.active.claim(job_id)?;
        self.process(claim).await
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        self.active.contains(job_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn extractor_name(&self) -> &str {
        self.extractor.name()
    }

    /// Extract a single image synchronously, without creating a job.
    pub async fn extract_inline(
        &self,
        owner: &str,
        doc: &SourceDocument,
    ) -> Result<InlineResult, InlineError> {
        let span = info_span!("import_inline", owner, extractor = self.extractor.name());
        async {
            match self.extractor.extract_page(doc, 1).await {
                PageOutcome::Recipe(recipe) => {
                    record_page("recipe");
                    let row = self.db.insert_recipe(owner, &recipe).await?;
                    info!(recipe_id = %row.id, "Inline import stored recipe");
                    Ok(InlineResult::Recipe(row))
                }
                PageOutcome::NoRecipe => {
                    record_page("no_recipe");
                    info!("Inline import found no recipe");
                    Ok(InlineResult::NoRecipe)
                }
                PageOutcome::Error(reason) => {
                    record_page("error");
                    warn!(error = %reason, "Inline extraction failed");
                    Err(InlineError::Extraction(reason))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn process(&self, claim: ActiveJob) -> Option<JobStatus> {
        let job_id = claim.id().to_string();
        let span = info_span!(
            "import_job",
            job_id = %job_id,
            owner = tracing::field::Empty,
            extractor = self.extractor.name(),
        );

        async {
            let started = Instant::now();
            let status = match self.drive(&job_id).await {
                Ok(status) => status,
                Err(DbError::NotFound(_)) => {
                    warn!("Import job missing from the store");
                    return None;
                }
                Err(e) => {
                    error!(error = %e, "Store error while processing import");
                    if let Err(e) = self.db.fail_job(&job_id, INTERNAL_FAILURE_MESSAGE).await {
                        error!(error = %e, "Could not mark import as failed");
                    }
                    self.status(&job_id).await.unwrap_or(JobStatus::Failed)
                }
            };

            if status.is_terminal() {
                record_job_finished(status, started.elapsed());
                info!(
                    status = %status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Import finished"
                );
            } else {
                warn!(status = %status, "Import processor stopped before a terminal status");
            }
            Some(status)
        }
        .instrument(span)
        .await
    }

    /// Walk the state machine for one job. Returns the stored status on exit.
    async fn drive(&self, id: &str) -> DbResult<JobStatus> {
        let job = self
            .db
            .get_import_job_unscoped(id)
            .await?
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;
        tracing::Span::current().record("owner", job.owner.as_str());

        if job.status != JobStatus::Pending {
            debug!(status = %job.status, "Import is not pending; nothing to do");
            return Ok(job.status);
        }
        if self.cancel_requested(id).await? {
            return self.status(id).await;
        }

        let doc = self
            .db
            .load_source(id)
            .await?
            .ok_or_else(|| DbError::NotFound(id.to_string()))?;

        let total_pages = match job.source_kind {
            // Single page: straight to processing.
            SourceKind::Image => {
                if !self
                    .db
                    .transition_status(id, JobStatus::Pending, JobStatus::Processing)
                    .await?
                {
                    return self.status(id).await;
                }
                1
            }
            SourceKind::Document => {
                let total = match self.extractor.page_count(&doc).await {
                    Ok(0) | Err(DecomposeError::NoPages) => {
                        return self.fail(id, NO_PAGES_MESSAGE).await;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        warn!(error = %e, "Document could not be decomposed");
                        return self.fail(id, &e.to_string()).await;
                    }
                };

                if !self.db.set_total_pages(id, total).await? {
                    return self.status(id).await;
                }
                info!(total_pages = total, "Document decomposed");

                if self.cancel_requested(id).await? {
                    return self.status(id).await;
                }
                if !self
                    .db
                    .transition_status(id, JobStatus::PagesQueued, JobStatus::Processing)
                    .await?
                {
                    return self.status(id).await;
                }
                total
            }
        };

        for page in 1..=total_pages {
            if self.cancel_requested(id).await? {
                return self.status(id).await;
            }

            let recorded = match self.extractor.extract_page(&doc, page).await {
                PageOutcome::Recipe(recipe) => {
                    record_page("recipe");
                    let recipe_id = self.db.record_page_recipe(id, page, &recipe).await?;
                    if let Some(recipe_id) = &recipe_id {
                        debug!(page, recipe_id = %recipe_id, title = %recipe.title, "Recipe recorded");
                    }
                    recipe_id.is_some()
                }
                PageOutcome::NoRecipe => {
                    record_page("no_recipe");
                    debug!(page, "No recipe on page");
                    self.db.record_skipped_page(id, page, None).await?
                }
                PageOutcome::Error(reason) => {
                    record_page("error");
                    warn!(page, error = %reason, "Page extraction failed; skipping page");
                    self.db.record_skipped_page(id, page, Some(&reason)).await?
                }
            };

            if !recorded {
                warn!(page, "Store refused page write; stopping");
                return self.status(id).await;
            }
        }

        if self.cancel_requested(id).await? {
            return self.status(id).await;
        }
        self.db.complete_job(id).await?;
        self.status(id).await
    }

    /// If the owner asked to cancel, finalize as cancelled and return true.
    async fn cancel_requested(&self, id: &str) -> DbResult<bool> {
        if !self.db.is_cancel_requested(id).await? {
            return Ok(false);
        }
        if self.db.cancel_job(id).await? {
            info!("Import cancelled by owner");
        }
        Ok(true)
    }

    async fn fail(&self, id: &str, message: &str) -> DbResult<JobStatus> {
        if self.db.fail_job(id, message).await? {
            info!(error = message, "Import failed");
        }
        self.status(id).await
    }

    async fn status(&self, id: &str) -> DbResult<JobStatus> {
        self.db
            .get_import_status(id)
            .await?
            .ok_or_else(|| DbError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::{ExtractedRecipe, MockExtractor};
    use larder_db::NewImportJob;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn recipe(title: &str) -> PageOutcome {
        PageOutcome::Recipe(ExtractedRecipe::titled(title))
    }

    async fn submit(db: &Database, kind: SourceKind) -> String {
        let content_type = match kind {
            SourceKind::Image => "image/png",
            SourceKind::Document => "application/pdf",
        };
        db.create_import_job(&NewImportJob {
            owner: "alice",
            source_kind: kind,
            content_type,
            file_name: None,
            bytes: b"fake upload bytes",
        })
        .await
        .unwrap()
        .id
    }

    async fn setup(extractor: Arc<dyn RecipeExtractor>) -> (Database, Arc<ImportRunner>) {
        let db = Database::new_in_memory().await.unwrap();
        let runner = Arc::new(ImportRunner::new(db.clone(), extractor));
        (db, runner)
    }

    async fn wait_until_terminal(db: &Database, id: &str) -> larder_db::ImportJob {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let job = db.get_import_job_unscoped(id).await.unwrap().unwrap();
                if job.status.is_terminal() {
                    return job;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("job should reach a terminal status")
    }

    /// Wait until the gated extractor has been asked for `n` pages.
    async fn wait_for_calls(extractor: &MockExtractor, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while extractor.calls().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("extractor should be called");
    }

    #[tokio::test]
    async fn test_three_page_document() {
        let extractor = Arc::new(MockExtractor::new(vec![
            recipe("Brown Bread"),
            PageOutcome::NoRecipe,
            recipe("Apple Tart"),
        ]));
        let (db, runner) = setup(extractor.clone()).await;
        let id = submit(&db, SourceKind::Document).await;

        assert_eq!(runner.run_to_completion(&id).await, Some(JobStatus::Completed));

        let job = db.get_import_job("alice", &id).await.unwrap().unwrap();
        assert_eq!(job.current_page, 3);
        assert_eq!(job.total_pages, 3);
        assert_eq!(
            job.results.iter().map(|r| (r.page_number, r.title.as_str())).collect::<Vec<_>>(),
            vec![(1, "Brown Bread"), (3, "Apple Tart")]
        );
        assert_eq!(job.skipped_pages, vec![2]);
        assert_eq!(extractor.calls(), vec![1, 2, 3]);
        assert!(!runner.is_active(&id));
    }

    #[tokio::test]
    async fn test_image_goes_straight_to_processing() {
        let (extractor, gate) = MockExtractor::new(vec![recipe("Scone")]).gated();
        let extractor = Arc::new(extractor);
        let (db, runner) = setup(extractor.clone()).await;
        let id = submit(&db, SourceKind::Image).await;

        assert!(runner.start(&id));
        wait_for_calls(&extractor, 1).await;
        let in_flight = db.get_import_job("alice", &id).await.unwrap().unwrap();
        assert_eq!(in_flight.status, JobStatus::Processing);
        assert_eq!((in_flight.current_page, in_flight.total_pages), (0, 1));

        gate.release(1);
        let job = wait_until_terminal(&db, &id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.results.len(), 1);
    }

    #[tokio::test]
    async fn test_progress_advances_one_page_at_a_time() {
        let (extractor, gate) = MockExtractor::new(vec![
            recipe("A"),
            PageOutcome::NoRecipe,
            recipe("B"),
            PageOutcome::NoRecipe,
        ])
        .gated();
        let extractor = Arc::new(extractor);
        let (db, runner) = setup(extractor.clone()).await;
        let id = submit(&db, SourceKind::Document).await;

        assert!(runner.start(&id));
        for page in 1..=4u32 {
            wait_for_calls(&extractor, page as usize).await;
            let job = db.get_import_job("alice", &id).await.unwrap().unwrap();
            assert_eq!(job.status, JobStatus::Processing);
            assert_eq!((job.current_page, job.total_pages), (page - 1, 4));
            gate.release(1);
        }

        let job = wait_until_terminal(&db, &id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.current_page, 4);
        assert_eq!(job.skipped_pages, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_page_error_is_a_skip() {
        let extractor = MockExtractor::new(vec![
            PageOutcome::Error("model timeout".into()),
            recipe("Champ"),
        ]);
        let (db, runner) = setup(Arc::new(extractor)).await;
        let id = submit(&db, SourceKind::Document).await;

        assert_eq!(runner.run_to_completion(&id).await, Some(JobStatus::Completed));
        let job = db.get_import_job("alice", &id).await.unwrap().unwrap();
        assert_eq!(job.skipped_pages, vec![1]);
        assert_eq!(job.results.len(), 1);
        assert_eq!(job.error, None);
    }

    #[tokio::test]
    async fn test_decompose_failure_fails_job() {
        let extractor = Arc::new(MockExtractor::failing_decompose(DecomposeError::Unreadable(
            "encrypted".into(),
        )));
        let (db, runner) = setup(extractor.clone()).await;
        let id = submit(&db, SourceKind::Document).await;

        assert_eq!(runner.run_to_completion(&id).await, Some(JobStatus::Failed));
        let job = db.get_import_job("alice", &id).await.unwrap().unwrap();
        assert_eq!(job.error.as_deref(), Some("Could not read document: encrypted"));
        assert_eq!(job.current_page, 0);
        assert!(extractor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_pages_fails_job() {
        let (db, runner) = setup(Arc::new(MockExtractor::new(Vec::new()))).await;
        let id = submit(&db, SourceKind::Document).await;

        assert_eq!(runner.run_to_completion(&id).await, Some(JobStatus::Failed));
        let job = db.get_import_job("alice", &id).await.unwrap().unwrap();
        assert_eq!(job.error.as_deref(), Some(NO_PAGES_MESSAGE));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let extractor = Arc::new(MockExtractor::new(vec![recipe("Never")]));
        let (db, runner) = setup(extractor.clone()).await;
        let id = submit(&db, SourceKind::Document).await;
        assert!(db.request_cancel("alice", &id).await.unwrap());

        assert_eq!(runner.run_to_completion(&id).await, Some(JobStatus::Cancelled));
        assert!(extractor.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_after_first_page_keeps_partial_results() {
        let (extractor, gate) =
            MockExtractor::new(vec![recipe("Coddle"), recipe("Stew")]).gated();
        let extractor = Arc::new(extractor);
        let (db, runner) = setup(extractor.clone()).await;
        let id = submit(&db, SourceKind::Document).await;

        assert!(runner.start(&id));
        assert!(!runner.start(&id), "second processor must be refused");

        // Page 1 is in flight; ask to cancel, then let it finish.
        tokio::time::timeout(Duration::from_secs(5), async {
            while extractor.calls().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(db.request_cancel("alice", &id).await.unwrap());
        gate.release(1);

        let job = wait_until_terminal(&db, &id).await;
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!(job.current_page, 1);
        assert_eq!(job.results.len(), 1);
        assert_eq!(extractor.calls(), vec![1], "page 2 must never start");
    }

    #[tokio::test]
    async fn test_cancel_during_last_page_wins_over_completion() {
        let (extractor, gate) =
            MockExtractor::new(vec![recipe("Coddle"), recipe("Stew")]).gated();
        let extractor = Arc::new(extractor);
        let (db, runner) = setup(extractor.clone()).await;
        let id = submit(&db, SourceKind::Document).await;

        assert!(runner.start(&id));
        wait_for_calls(&extractor, 1).await;
        gate.release(1);

        // Page 2 is the last page and is in flight.
        wait_for_calls(&extractor, 2).await;
        assert!(db.request_cancel("alice", &id).await.unwrap());
        gate.release(1);

        let job = wait_until_terminal(&db, &id).await;
        assert_eq!(job.status, JobStatus::Cancelled);
        assert_eq!((job.current_page, job.total_pages), (2, 2));
        assert_eq!(
            job.results.iter().map(|r| r.title.as_str()).collect::<Vec<_>>(),
            vec!["Coddle", "Stew"]
        );
        assert!(!runner.is_active(&id));
    }

    #[tokio::test]
    async fn test_terminal_job_is_left_alone() {
        let extractor = Arc::new(MockExtractor::new(vec![recipe("Once")]));
        let (db, runner) = setup(extractor.clone()).await;
        let id = submit(&db, SourceKind::Image).await;

        assert_eq!(runner.run_to_completion(&id).await, Some(JobStatus::Completed));
        let before = db.get_import_job("alice", &id).await.unwrap().unwrap();

        assert_eq!(runner.run_to_completion(&id).await, Some(JobStatus::Completed));
        assert_eq!(db.get_import_job("alice", &id).await.unwrap().unwrap(), before);
        assert_eq!(extractor.calls(), vec![1]);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let (_db, runner) = setup(Arc::new(MockExtractor::new(Vec::new()))).await;
        assert_eq!(runner.run_to_completion("missing").await, None);
        assert_eq!(runner.active_count(), 0);
    }

    #[tokio::test]
    async fn test_extract_inline() {
        let (db, runner) = setup(Arc::new(MockExtractor::new(vec![recipe("Farl")]))).await;
        let doc = SourceDocument {
            job_id: None,
            kind: SourceKind::Image,
            content_type: "image/jpeg".into(),
            bytes: vec![0xFF, 0xD8, 0xFF],
        };

        let InlineResult::Recipe(row) = runner.extract_inline("alice", &doc).await.unwrap() else {
            panic!("expected a recipe");
        };
        assert_eq!(row.title, "Farl");
        assert!(db.get_recipe("alice", &row.id).await.unwrap().is_some());

        let (_db, empty) = setup(Arc::new(MockExtractor::new(vec![PageOutcome::NoRecipe]))).await;
        assert_eq!(
            empty.extract_inline("alice", &doc).await.unwrap(),
            InlineResult::NoRecipe
        );

        let (_db, broken) =
            setup(Arc::new(MockExtractor::new(vec![PageOutcome::Error("boom".into())]))).await;
        assert!(matches!(
            broken.extract_inline("alice", &doc).await,
            Err(InlineError::Extraction(msg)) if msg == "boom"
        ));
    }
}
