// crates/types/src/api.rs
//! Request/response bodies for the `/api/imports` endpoints.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::job::{JobStatus, SourceKind};

/// Request header carrying the authenticated user id, set by the auth proxy
/// in front of the server.
pub const CALLER_HEADER: &str = "x-larder-user";

/// One recipe recorded from one page of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub page_number: u32,
    pub recipe_id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressInfo {
    pub current_page: u32,
    pub total_pages: u32,
}

/// Response for GET /api/imports/{id}.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../web/src/types/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub source_kind: SourceKind,
    pub progress: JobProgressInfo,
    /// Recipes recorded so far, in page order.
    pub results: Vec<PageResult>,
    /// Pages where no recipe was found (or extraction errored).
    pub skipped_pages: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobStatusResponse {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Response for POST /api/imports.
///
/// Multi-page uploads (and images without the fast path) always get a job.
/// The image fast path extracts inline and answers with the recipe itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../web/src/types/generated/")
)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CreateImportResponse {
    Job {
        #[serde(rename = "jobId")]
        job_id: String,
    },
    Recipe {
        #[serde(rename = "recipeId")]
        recipe_id: String,
        title: String,
    },
    NoRecipe,
}

/// Response for POST /api/imports/{id}/cancel.
///
/// Identical whether the cancel applied, the job was already terminal, or the
/// job does not exist for this caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../web/src/types/generated/")
)]
pub struct CancelResponse {
    pub ok: bool,
}

/// Structured JSON error body for API errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../web/src/types/generated/")
)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }

    /// The most specific human-readable message in this body.
    pub fn message(&self) -> &str {
        self.details.as_deref().unwrap_or(&self.error)
    }
}
