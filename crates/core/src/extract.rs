// crates/core/src/extract.rs
//! The extraction capability the import orchestrator calls into.
//!
//! How raw page content becomes a structured recipe is not this crate's
//! concern. Implementations include:
//! - `HttpRecipeExtractor` (server crate) — calls an external extraction service
//! - `MockExtractor` — scripted outcomes for tests

use async_trait::async_trait;
use larder_types::SourceKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The uploaded bytes of one job, as handed to the extractor.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// `None` for inline (fast path) extraction, which has no job.
    pub job_id: Option<String>,
    pub kind: SourceKind,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A structured recipe returned by the extractor.
///
/// `data` is opaque to the orchestrator and stored as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecipe {
    pub title: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ExtractedRecipe {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data: serde_json::Value::Null,
        }
    }
}

/// Result of extracting a single page.
///
/// "No recipe on this page" is an ordinary outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Recipe(ExtractedRecipe),
    NoRecipe,
    /// Page-level failure. The orchestrator records the page as skipped.
    Error(String),
}

/// Job-level failure: the document could not be split into pages at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecomposeError {
    #[error("Document has no pages")]
    NoPages,

    #[error("Could not read document: {0}")]
    Unreadable(String),

    #[error("Extraction service unavailable: {0}")]
    Unavailable(String),
}

/// Trait for recipe extraction backends.
#[async_trait]
pub trait RecipeExtractor: Send + Sync {
    /// Number of pages in a multi-page document. Never called for images,
    /// which are always a single page.
    async fn page_count(&self, doc: &SourceDocument) -> Result<u32, DecomposeError>;

    /// Extract page `page` (1-based).
    async fn extract_page(&self, doc: &SourceDocument, page: u32) -> PageOutcome;

    /// Backend name for logging (e.g. "http", "mock").
    fn name(&self) -> &str;
}
