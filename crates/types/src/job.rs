// crates/types/src/job.rs
//! Import job status and source kind.

use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle status of an extraction job.
///
/// ```text
/// pending --> pages_queued --> processing --> completed | failed
/// pending | pages_queued | processing --> cancelled
/// ```
///
/// Single-image jobs skip `pages_queued`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../web/src/types/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    PagesQueued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Statuses with no outgoing transitions.
    pub const TERMINAL: [JobStatus; 3] = [Self::Completed, Self::Failed, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PagesQueued => "pages_queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "pages_queued" => Some(Self::PagesQueued),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Pending, PagesQueued) | (Pending, Processing) => true,
            (PagesQueued, Processing) => true,
            (Processing, Completed) | (Processing, Failed) => true,
            // Decomposition happens before any page starts, so a document
            // that cannot be split fails straight out of pending.
            (Pending, Failed) | (PagesQueued, Failed) => true,
            (Pending, Cancelled) | (PagesQueued, Cancelled) | (Processing, Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of upload a job was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(
    feature = "codegen",
    ts(export, export_to = "../../web/src/types/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A single photographed page.
    Image,
    /// A multi-page document (PDF).
    Document,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "document" => Some(Self::Document),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
