// crates/client/src/view.rs
use larder_core::ImportSummary;
use larder_types::{JobProgressInfo, PageResult};

use crate::phase::FailureReason;

/// What the poller drives. Implemented by the terminal UI and by test
/// recorders; every method is a render instruction, none may block.
pub trait ImportView: Send + Sync {
    /// A non-terminal snapshot arrived.
    fn render_progress(&self, job_id: &str, progress: &JobProgressInfo, partial: &[PageResult]);

    /// Exactly one recipe: go straight to it.
    fn navigate_to_recipe(&self, recipe: &PageResult);

    /// More than one recipe.
    fn show_summary(&self, summary: &ImportSummary);

    fn show_no_recipe(&self);

    fn show_error(&self, reason: &FailureReason);

    /// Back to the pre-submission screen, with no error shown.
    fn reset(&self);
}
