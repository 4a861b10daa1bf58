// crates/client/src/phase.rs
//! Client-observed import states.

use std::fmt;

use larder_core::{ImportOutcome, ImportSummary};
use larder_types::{JobProgressInfo, PageResult};

/// Where an import stands from the client's point of view.
///
/// `idle -> submitted -> polling -> {completed-*, failed}`. A cancelled job
/// goes back to `Idle`: cancellation is not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ClientPhase {
    #[default]
    Idle,
    Submitted,
    Polling {
        job_id: String,
        progress: JobProgressInfo,
        /// Recipes recorded so far, for the partial-results list.
        partial: Vec<PageResult>,
    },
    CompletedSingle(PageResult),
    CompletedMulti(ImportSummary),
    CompletedEmpty,
    Failed(FailureReason),
}

impl ClientPhase {
    /// True once polling has nothing more to do.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Idle
                | Self::CompletedSingle(_)
                | Self::CompletedMulti(_)
                | Self::CompletedEmpty
                | Self::Failed(_)
        )
    }

    pub fn job_id(&self) -> Option<&str> {
        match self {
            Self::Polling { job_id, .. } => Some(job_id),
            _ => None,
        }
    }
}

impl From<ImportOutcome> for ClientPhase {
    fn from(outcome: ImportOutcome) -> Self {
        match outcome {
            ImportOutcome::Empty { .. } => Self::CompletedEmpty,
            ImportOutcome::Single(recipe) => Self::CompletedSingle(recipe),
            ImportOutcome::Multiple(summary) => Self::CompletedMulti(summary),
        }
    }
}

/// Why an import ended without a usable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The job reached `failed`; carries its error message.
    Server(String),
    /// The upload was refused at submission.
    Rejected(String),
    /// Polling hit its duration cap. The job may still finish server-side.
    TimedOut,
    /// Too many consecutive requests got no answer.
    Unreachable,
    /// The server no longer knows the job.
    JobLost,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(message) | Self::Rejected(message) => f.write_str(message),
            Self::TimedOut => f.write_str("Import is taking too long. Check back later."),
            Self::Unreachable => f.write_str("Could not reach the server. Check your connection."),
            Self::JobLost => f.write_str("Import not found."),
        }
    }
}
