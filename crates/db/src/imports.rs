// crates/db/src/imports.rs
// Import job store: creation, owner-scoped reads, guarded per-page writes.
//
// Every content write carries a status guard in its WHERE clause, so a job
// that reached a terminal status can no longer change at the storage layer
// no matter which task issues the write.

use chrono::Utc;
use larder_core::{ExtractedRecipe, SourceDocument};
use larder_types::{JobProgressInfo, JobStatus, JobStatusResponse, PageResult, SourceKind};
use sqlx::SqliteConnection;
use tracing::warn;
use uuid::Uuid;

use crate::{Database, DbError, DbResult};

const NOT_TERMINAL: &str = "status NOT IN ('completed', 'failed', 'cancelled')";

/// Insert payload for [`Database::create_import_job`].
#[derive(Debug, Clone)]
pub struct NewImportJob<'a> {
    pub owner: &'a str,
    pub source_kind: SourceKind,
    pub content_type: &'a str,
    pub file_name: Option<&'a str>,
    pub bytes: &'a [u8],
}

/// One import job with its recorded page outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportJob {
    pub id: String,
    pub owner: String,
    pub status: JobStatus,
    pub source_kind: SourceKind,
    pub content_type: String,
    pub total_pages: u32,
    pub current_page: u32,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub created_at: String,
    pub updated_at: String,
    /// Page order.
    pub results: Vec<PageResult>,
    /// Ascending.
    pub skipped_pages: Vec<u32>,
}

impl ImportJob {
    pub fn to_response(&self) -> JobStatusResponse {
        JobStatusResponse {
            job_id: self.id.clone(),
            status: self.status,
            source_kind: self.source_kind,
            progress: JobProgressInfo {
                current_page: self.current_page,
                total_pages: self.total_pages,
            },
            results: self.results.clone(),
            skipped_pages: self.skipped_pages.clone(),
            error: self.error.clone(),
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// A stored recipe. The recipe body is opaque JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeRow {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub data: serde_json::Value,
    pub source_job_id: Option<String>,
    pub source_page: Option<u32>,
    pub created_at: String,
}

/// Counts from [`Database::fail_interrupted_jobs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveredJobs {
    pub failed: u64,
    pub cancelled: u64,
}

type JobRow = (
    String,
    String,
    String,
    String,
    String,
    i64,
    i64,
    Option<String>,
    bool,
    String,
    String,
);

fn parse_status(value: &str) -> DbResult<JobStatus> {
    JobStatus::from_db_str(value).ok_or_else(|| DbError::InvalidStatus {
        column: "status",
        value: value.to_string(),
    })
}

fn parse_kind(value: &str) -> DbResult<SourceKind> {
    SourceKind::from_db_str(value).ok_or_else(|| DbError::InvalidStatus {
        column: "source_kind",
        value: value.to_string(),
    })
}

/// Load a job plus its results and skipped pages over one connection.
///
/// `owner = None` skips the ownership filter (orchestrator only).
async fn load_job(
    conn: &mut SqliteConnection,
    id: &str,
    owner: Option<&str>,
) -> DbResult<Option<ImportJob>> {
    let row: Option<JobRow> = sqlx::query_as(
        r#"
        SELECT id, owner, status, source_kind, content_type, total_pages,
               current_page, error, cancel_requested, created_at, updated_at
        FROM import_jobs
        WHERE id = ?1 AND (?2 IS NULL OR owner = ?2)
        "#,
    )
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((
        id,
        owner,
        status,
        source_kind,
        content_type,
        total_pages,
        current_page,
        error,
        cancel_requested,
        created_at,
        updated_at,
    )) = row
    else {
        return Ok(None);
    };

    let results: Vec<(i64, String, String)> = sqlx::query_as(
        "SELECT page_number, recipe_id, title FROM import_job_results WHERE job_id = ?1 ORDER BY page_number",
    )
    .bind(&id)
    .fetch_all(&mut *conn)
    .await?;

    let skipped: Vec<(i64,)> = sqlx::query_as(
        "SELECT page_number FROM import_job_skipped_pages WHERE job_id = ?1 ORDER BY page_number",
    )
    .bind(&id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Some(ImportJob {
        status: parse_status(&status)?,
        source_kind: parse_kind(&source_kind)?,
        id,
        owner,
        content_type,
        total_pages: total_pages as u32,
        current_page: current_page as u32,
        error,
        cancel_requested,
        created_at,
        updated_at,
        results: results
            .into_iter()
            .map(|(page_number, recipe_id, title)| PageResult {
                page_number: page_number as u32,
                recipe_id,
                title,
            })
            .collect(),
        skipped_pages: skipped.into_iter().map(|(p,)| p as u32).collect(),
    }))
}

impl Database {
    // ========================================================================
    // Creation and reads
    // ========================================================================

    /// Persist a new pending job together with its uploaded bytes.
    ///
    /// Images are a single page from the start; documents report 0 pages
    /// until decomposed.
    pub async fn create_import_job(&self, new: &NewImportJob<'_>) -> DbResult<ImportJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let total_pages: i64 = match new.source_kind {
            SourceKind::Image => 1,
            SourceKind::Document => 0,
        };

        let mut tx = self.pool().begin().await?;
        sqlx::query(
            r#"
            INSERT INTO import_jobs
                (id, owner, status, source_kind, content_type, total_pages, current_page,
                 cancel_requested, created_at, updated_at)
            VALUES (?1, ?2, 'pending', ?3, ?4, ?5, 0, 0, ?6, ?6)
            "#,
        )
        .bind(&id)
        .bind(new.owner)
        .bind(new.source_kind.as_str())
        .bind(new.content_type)
        .bind(total_pages)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO import_sources (job_id, file_name, bytes) VALUES (?1, ?2, ?3)")
            .bind(&id)
            .bind(new.file_name)
            .bind(new.bytes)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(ImportJob {
            id,
            owner: new.owner.to_string(),
            status: JobStatus::Pending,
            source_kind: new.source_kind,
            content_type: new.content_type.to_string(),
            total_pages: total_pages as u32,
            current_page: 0,
            error: None,
            cancel_requested: false,
            created_at: now.clone(),
            updated_at: now,
            results: Vec::new(),
            skipped_pages: Vec::new(),
        })
    }

    /// Owner-scoped read. A job owned by someone else reads as `None`.
    ///
    /// Job row, results and skipped pages come from one transaction so the
    /// snapshot never mixes two page writes.
    pub async fn get_import_job(&self, owner: &str, id: &str) -> DbResult<Option<ImportJob>> {
        let mut tx = self.pool().begin().await?;
        let job = load_job(&mut *tx, id, Some(owner)).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Unscoped read for the orchestrator.
    pub async fn get_import_job_unscoped(&self, id: &str) -> DbResult<Option<ImportJob>> {
        let mut tx = self.pool().begin().await?;
        let job = load_job(&mut *tx, id, None).await?;
        tx.commit().await?;
        Ok(job)
    }

    /// Current status only, for the orchestrator's checkpoints.
    pub async fn get_import_status(&self, id: &str) -> DbResult<Option<JobStatus>> {
        let status: Option<String> = sqlx::query_scalar("SELECT status FROM import_jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        status.as_deref().map(parse_status).transpose()
    }

    /// The uploaded bytes for a job, shaped for the extractor.
    pub async fn load_source(&self, id: &str) -> DbResult<Option<SourceDocument>> {
        let row: Option<(String, String, Vec<u8>)> = sqlx::query_as(
            r#"
            SELECT j.source_kind, j.content_type, s.bytes
            FROM import_jobs j
            JOIN import_sources s ON s.job_id = j.id
            WHERE j.id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(|(kind, content_type, bytes)| {
            Ok(SourceDocument {
                job_id: Some(id.to_string()),
                kind: parse_kind(&kind)?,
                content_type,
                bytes,
            })
        })
        .transpose()
    }

    // ========================================================================
    // Orchestrator writes
    // ========================================================================

    /// Compare-and-set the status. Returns whether the row moved.
    ///
    /// Transitions the state machine does not allow are refused before
    /// touching the database.
    pub async fn transition_status(&self, id: &str, from: JobStatus, to: JobStatus) -> DbResult<bool> {
        if !from.can_transition_to(to) {
            return Err(DbError::InvalidStatus {
                column: "status",
                value: format!("{from} -> {to}"),
            });
        }

        let result = sqlx::query(
            "UPDATE import_jobs SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record the decomposed page count and move pending -> pages_queued.
    pub async fn set_total_pages(&self, id: &str, total_pages: u32) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE import_jobs
            SET total_pages = ?2, status = 'pages_queued', updated_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(total_pages as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record a recipe found on `page` and advance `current_page` to it.
    ///
    /// One transaction: recipe row, result row, progress. Refused (returns
    /// `None`) unless the job is processing and `page` is exactly the next
    /// page within `total_pages`.
    pub async fn record_page_recipe(
        &self,
        id: &str,
        page: u32,
        recipe: &ExtractedRecipe,
    ) -> DbResult<Option<String>> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool().begin().await?;

        // Write first so the transaction holds the write lock before reading.
        let owner: Option<(String,)> = sqlx::query_as(
            r#"
            UPDATE import_jobs
            SET current_page = ?2, updated_at = ?3
            WHERE id = ?1
              AND status = 'processing'
              AND current_page = ?2 - 1
              AND ?2 <= total_pages
            RETURNING owner
            "#,
        )
        .bind(id)
        .bind(page as i64)
        .bind(&now)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((owner,)) = owner else {
            tx.rollback().await?;
            return Ok(None);
        };

        let recipe_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO recipes (id, owner, title, data, source_job_id, source_page, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&recipe_id)
        .bind(&owner)
        .bind(&recipe.title)
        .bind(recipe.data.to_string())
        .bind(id)
        .bind(page as i64)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO import_job_results (job_id, page_number, recipe_id, title) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id)
        .bind(page as i64)
        .bind(&recipe_id)
        .bind(&recipe.title)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(recipe_id))
    }

    /// Record `page` as skipped and advance `current_page` to it. Same guards
    /// as [`Database::record_page_recipe`].
    pub async fn record_skipped_page(&self, id: &str, page: u32, reason: Option<&str>) -> DbResult<bool> {
        let mut tx = self.pool().begin().await?;

        let advanced = sqlx::query(
            r#"
            UPDATE import_jobs
            SET current_page = ?2, updated_at = ?3
            WHERE id = ?1
              AND status = 'processing'
              AND current_page = ?2 - 1
              AND ?2 <= total_pages
            "#,
        )
        .bind(id)
        .bind(page as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        if advanced.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO import_job_skipped_pages (job_id, page_number, reason) VALUES (?1, ?2, ?3)",
        )
        .bind(id)
        .bind(page as i64)
        .bind(reason)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// processing -> completed, only once every page has been attempted.
    pub async fn complete_job(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE import_jobs
            SET status = 'completed', updated_at = ?2
            WHERE id = ?1 AND status = 'processing' AND current_page = total_pages
            "#,
        )
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Any active status -> failed. The error is written exactly once.
    pub async fn fail_job(&self, id: &str, error: &str) -> DbResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE import_jobs SET status = 'failed', error = ?2, updated_at = ?3 \
             WHERE id = ?1 AND error IS NULL AND {NOT_TERMINAL}"
        ))
        .bind(id)
        .bind(error)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Any active status -> cancelled, only if the owner asked for it.
    pub async fn cancel_job(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE import_jobs SET status = 'cancelled', updated_at = ?2 \
             WHERE id = ?1 AND cancel_requested = 1 AND {NOT_TERMINAL}"
        ))
        .bind(id)
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // ========================================================================
    // Cancellation flag
    // ========================================================================

    /// Set `cancel_requested` on an active job owned by `owner`.
    ///
    /// Touches no other column. Returns false for unknown, foreign, terminal
    /// or already-flagged jobs; callers must not tell these apart outwardly.
    pub async fn request_cancel(&self, owner: &str, id: &str) -> DbResult<bool> {
        let result = sqlx::query(&format!(
            "UPDATE import_jobs SET cancel_requested = 1 \
             WHERE id = ?1 AND owner = ?2 AND cancel_requested = 0 AND {NOT_TERMINAL}"
        ))
        .bind(id)
        .bind(owner)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn is_cancel_requested(&self, id: &str) -> DbResult<bool> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT cancel_requested FROM import_jobs WHERE id = ?1")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some_and(|(flag,)| flag))
    }

    // ========================================================================
    // Startup recovery
    // ========================================================================

    /// Finalize jobs a previous process left active.
    ///
    /// Jobs whose owner already asked to cancel become cancelled; the rest
    /// fail with `message`. Must run before any processor starts.
    pub async fn fail_interrupted_jobs(&self, message: &str) -> DbResult<RecoveredJobs> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool().begin().await?;

        let cancelled = sqlx::query(&format!(
            "UPDATE import_jobs SET status = 'cancelled', updated_at = ?1 \
             WHERE cancel_requested = 1 AND {NOT_TERMINAL}"
        ))
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let failed = sqlx::query(&format!(
            "UPDATE import_jobs SET status = 'failed', error = COALESCE(error, ?1), updated_at = ?2 \
             WHERE {NOT_TERMINAL}"
        ))
        .bind(message)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(RecoveredJobs { failed, cancelled })
    }

    // ========================================================================
    // Recipes
    // ========================================================================

    /// Store a recipe outside any job (image fast path).
    pub async fn insert_recipe(&self, owner: &str, recipe: &ExtractedRecipe) -> DbResult<RecipeRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO recipes (id, owner, title, data, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&id)
        .bind(owner)
        .bind(&recipe.title)
        .bind(recipe.data.to_string())
        .bind(&now)
        .execute(self.pool())
        .await?;

        Ok(RecipeRow {
            id,
            owner: owner.to_string(),
            title: recipe.title.clone(),
            data: recipe.data.clone(),
            source_job_id: None,
            source_page: None,
            created_at: now,
        })
    }

    pub async fn get_recipe(&self, owner: &str, id: &str) -> DbResult<Option<RecipeRow>> {
        let row: Option<(String, String, String, String, Option<String>, Option<i64>, String)> =
            sqlx::query_as(
                r#"
                SELECT id, owner, title, data, source_job_id, source_page, created_at
                FROM recipes
                WHERE id = ?1 AND owner = ?2
                "#,
            )
            .bind(id)
            .bind(owner)
            .fetch_optional(self.pool())
            .await?;

        row.map(|(id, owner, title, data, source_job_id, source_page, created_at)| {
            let data = match serde_json::from_str(&data) {
                Ok(data) => data,
                Err(source) => {
                    warn!(recipe_id = %id, error = %source, "Stored recipe body is corrupt");
                    return Err(DbError::CorruptRecipe { id, source });
                }
            };
            Ok(RecipeRow {
                id,
                owner,
                title,
                data,
                source_job_id,
                source_page: source_page.map(|p| p as u32),
                created_at,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn document_job(db: &Database, owner: &str) -> ImportJob {
        db.create_import_job(&NewImportJob {
            owner,
            source_kind: SourceKind::Document,
            content_type: "application/pdf",
            file_name: Some("cookbook.pdf"),
            bytes: b"%PDF-1.7 fake",
        })
        .await
        .unwrap()
    }

    /// pending -> pages_queued -> processing with `pages` pages.
    async fn processing_job(db: &Database, pages: u32) -> ImportJob {
        let job = document_job(db, "alice").await;
        assert!(db.set_total_pages(&job.id, pages).await.unwrap());
        assert!(db
            .transition_status(&job.id, JobStatus::PagesQueued, JobStatus::Processing)
            .await
            .unwrap());
        job
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let db = Database::new_in_memory().await.unwrap();
        let job = document_job(&db, "alice").await;

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.total_pages, 0);

        let read = db.get_import_job("alice", &job.id).await.unwrap().unwrap();
        assert_eq!(read, job);

        let source = db.load_source(&job.id).await.unwrap().unwrap();
        assert_eq!(source.kind, SourceKind::Document);
        assert_eq!(source.bytes, b"%PDF-1.7 fake".to_vec());
    }

    #[tokio::test]
    async fn test_image_job_starts_with_one_page() {
        let db = Database::new_in_memory().await.unwrap();
        let job = db
            .create_import_job(&NewImportJob {
                owner: "alice",
                source_kind: SourceKind::Image,
                content_type: "image/png",
                file_name: None,
                bytes: &[0x89, b'P', b'N', b'G'],
            })
            .await
            .unwrap();
        assert_eq!(job.total_pages, 1);
        assert!(db
            .transition_status(&job.id, JobStatus::Pending, JobStatus::Processing)
            .await
            .unwrap());
        assert_eq!(
            db.get_import_status(&job.id).await.unwrap(),
            Some(JobStatus::Processing)
        );
        assert_eq!(db.get_import_status("no-such-job").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_foreign_owner_reads_nothing() {
        let db = Database::new_in_memory().await.unwrap();
        let job = document_job(&db, "alice").await;

        assert!(db.get_import_job("mallory", &job.id).await.unwrap().is_none());
        assert!(db.get_import_job("alice", "no-such-job").await.unwrap().is_none());
        assert!(!db.request_cancel("mallory", &job.id).await.unwrap());
        assert!(!db.is_cancel_requested(&job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_disallowed_transition_is_refused() {
        let db = Database::new_in_memory().await.unwrap();
        let job = document_job(&db, "alice").await;

        let err = db
            .transition_status(&job.id, JobStatus::Completed, JobStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidStatus { column: "status", .. }));

        // Allowed, but the row is not in `from`.
        assert!(!db
            .transition_status(&job.id, JobStatus::PagesQueued, JobStatus::Processing)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_three_page_document() {
        let db = Database::new_in_memory().await.unwrap();
        let job = processing_job(&db, 3).await;

        let first = db
            .record_page_recipe(&job.id, 1, &ExtractedRecipe::titled("Soda Bread"))
            .await
            .unwrap()
            .expect("page 1 accepted");
        assert!(db.record_skipped_page(&job.id, 2, None).await.unwrap());
        db.record_page_recipe(&job.id, 3, &ExtractedRecipe::titled("Barmbrack"))
            .await
            .unwrap()
            .expect("page 3 accepted");
        assert!(db.complete_job(&job.id).await.unwrap());

        let done = db.get_import_job("alice", &job.id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.current_page, 3);
        assert_eq!(
            done.results.iter().map(|r| r.page_number).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(done.skipped_pages, vec![2]);

        let recipe = db.get_recipe("alice", &first).await.unwrap().unwrap();
        assert_eq!(recipe.title, "Soda Bread");
        assert_eq!(recipe.source_job_id.as_deref(), Some(job.id.as_str()));
        assert_eq!(recipe.source_page, Some(1));
    }

    #[tokio::test]
    async fn test_out_of_order_and_out_of_range_pages_rejected() {
        let db = Database::new_in_memory().await.unwrap();
        let job = processing_job(&db, 2).await;

        // Skipping ahead.
        assert!(!db.record_skipped_page(&job.id, 2, None).await.unwrap());
        assert!(db.record_skipped_page(&job.id, 1, None).await.unwrap());
        // Replaying.
        assert!(!db.record_skipped_page(&job.id, 1, None).await.unwrap());
        assert!(db.record_skipped_page(&job.id, 2, None).await.unwrap());
        // Past the end.
        assert!(db
            .record_page_recipe(&job.id, 3, &ExtractedRecipe::titled("Ghost"))
            .await
            .unwrap()
            .is_none());

        let read = db.get_import_job_unscoped(&job.id).await.unwrap().unwrap();
        assert_eq!(read.current_page, 2);
        assert!(read.results.is_empty());
    }

    #[tokio::test]
    async fn test_complete_requires_all_pages() {
        let db = Database::new_in_memory().await.unwrap();
        let job = processing_job(&db, 2).await;
        assert!(db.record_skipped_page(&job.id, 1, None).await.unwrap());
        assert!(!db.complete_job(&job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_terminal_rows_are_immutable() {
        let db = Database::new_in_memory().await.unwrap();
        let job = processing_job(&db, 2).await;
        db.record_page_recipe(&job.id, 1, &ExtractedRecipe::titled("Colcannon"))
            .await
            .unwrap();
        assert!(db.fail_job(&job.id, "extractor exploded").await.unwrap());
        let before = db.get_import_job("alice", &job.id).await.unwrap().unwrap();

        assert!(!db.fail_job(&job.id, "second error").await.unwrap());
        assert!(!db.record_skipped_page(&job.id, 2, None).await.unwrap());
        assert!(!db.request_cancel("alice", &job.id).await.unwrap());
        assert!(!db.cancel_job(&job.id).await.unwrap());
        assert!(!db.complete_job(&job.id).await.unwrap());

        let after = db.get_import_job("alice", &job.id).await.unwrap().unwrap();
        assert_eq!(after, before);
        assert_eq!(after.error.as_deref(), Some("extractor exploded"));
    }

    #[tokio::test]
    async fn test_cancel_needs_request_and_keeps_results() {
        let db = Database::new_in_memory().await.unwrap();
        let job = processing_job(&db, 2).await;
        db.record_page_recipe(&job.id, 1, &ExtractedRecipe::titled("Coddle"))
            .await
            .unwrap();

        assert!(!db.cancel_job(&job.id).await.unwrap(), "no request yet");
        assert!(db.request_cancel("alice", &job.id).await.unwrap());
        assert!(!db.request_cancel("alice", &job.id).await.unwrap(), "already flagged");
        assert!(db.is_cancel_requested(&job.id).await.unwrap());

        // The flag alone changes nothing else.
        let flagged = db.get_import_job("alice", &job.id).await.unwrap().unwrap();
        assert_eq!(flagged.status, JobStatus::Processing);
        assert_eq!(flagged.current_page, 1);

        assert!(db.cancel_job(&job.id).await.unwrap());
        let cancelled = db.get_import_job("alice", &job.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert_eq!(cancelled.results.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_noop() {
        let db = Database::new_in_memory().await.unwrap();
        let job = processing_job(&db, 1).await;
        db.record_page_recipe(&job.id, 1, &ExtractedRecipe::titled("Stew"))
            .await
            .unwrap();
        assert!(db.complete_job(&job.id).await.unwrap());

        assert!(!db.request_cancel("alice", &job.id).await.unwrap());
        let read = db.get_import_job("alice", &job.id).await.unwrap().unwrap();
        assert_eq!(read.status, JobStatus::Completed);
        assert!(!read.cancel_requested);
    }

    #[tokio::test]
    async fn test_fail_interrupted_jobs() {
        let db = Database::new_in_memory().await.unwrap();
        let stuck = processing_job(&db, 3).await;
        let queued = document_job(&db, "bob").await;
        let flagged = document_job(&db, "carol").await;
        db.request_cancel("carol", &flagged.id).await.unwrap();
        let finished = processing_job(&db, 1).await;
        db.record_skipped_page(&finished.id, 1, None).await.unwrap();
        db.complete_job(&finished.id).await.unwrap();

        let recovered = db
            .fail_interrupted_jobs("Import interrupted by server restart")
            .await
            .unwrap();
        assert_eq!(recovered, RecoveredJobs { failed: 2, cancelled: 1 });

        let stuck = db.get_import_job_unscoped(&stuck.id).await.unwrap().unwrap();
        assert_eq!(stuck.status, JobStatus::Failed);
        assert_eq!(stuck.error.as_deref(), Some("Import interrupted by server restart"));
        let queued = db.get_import_job_unscoped(&queued.id).await.unwrap().unwrap();
        assert_eq!(queued.status, JobStatus::Failed);
        let flagged = db.get_import_job_unscoped(&flagged.id).await.unwrap().unwrap();
        assert_eq!(flagged.status, JobStatus::Cancelled);
        assert_eq!(flagged.error, None);
        let finished = db.get_import_job_unscoped(&finished.id).await.unwrap().unwrap();
        assert_eq!(finished.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_fast_path_recipe_is_owner_scoped() {
        let db = Database::new_in_memory().await.unwrap();
        let recipe = ExtractedRecipe {
            title: "Boxty".into(),
            data: serde_json::json!({"ingredients": ["potato"]}),
        };
        let row = db.insert_recipe("alice", &recipe).await.unwrap();

        let read = db.get_recipe("alice", &row.id).await.unwrap().unwrap();
        assert_eq!(read, row);
        assert!(db.get_recipe("bob", &row.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_recipe_body_is_an_error() {
        let db = Database::new_in_memory().await.unwrap();
        let row = db
            .insert_recipe("alice", &ExtractedRecipe::titled("Coddle"))
            .await
            .unwrap();
        sqlx::query("UPDATE recipes SET data = '{not json' WHERE id = ?1")
            .bind(&row.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.get_recipe("alice", &row.id).await.unwrap_err();
        assert!(matches!(err, DbError::CorruptRecipe { ref id, .. } if *id == row.id));
    }

    #[tokio::test]
    async fn test_response_shape() {
        let db = Database::new_in_memory().await.unwrap();
        let job = processing_job(&db, 2).await;
        db.record_skipped_page(&job.id, 1, Some("blank page")).await.unwrap();

        let resp = db
            .get_import_job("alice", &job.id)
            .await
            .unwrap()
            .unwrap()
            .to_response();
        assert_eq!(resp.job_id, job.id);
        assert_eq!(resp.status, JobStatus::Processing);
        assert_eq!(resp.progress, JobProgressInfo { current_page: 1, total_pages: 2 });
        assert_eq!(resp.skipped_pages, vec![1]);
        assert_eq!(resp.error, None);
    }
}
