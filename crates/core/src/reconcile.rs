// crates/core/src/reconcile.rs
//! Decides what the client does with a finished import.
//!
//! Exactly one recipe navigates straight to it; zero shows "no recipe found";
//! more than one shows a summary. Snapshots from polling and answers from the
//! image fast path both go through [`reconcile`], so the decision lives here
//! and nowhere else.

use larder_types::{CreateImportResponse, JobStatus, JobStatusResponse, PageResult};

/// Multi-recipe summary view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Recipes in page order.
    pub recipes: Vec<PageResult>,
    /// Pages where no recipe was found, ascending.
    pub skipped_pages: Vec<u32>,
}

impl ImportSummary {
    pub fn skipped_count(&self) -> usize {
        self.skipped_pages.len()
    }

    /// `"1 page skipped"`, `"3 pages skipped"`, or `None` when nothing was skipped.
    pub fn skipped_label(&self) -> Option<String> {
        match self.skipped_count() {
            0 => None,
            1 => Some("1 page skipped".to_string()),
            n => Some(format!("{n} pages skipped")),
        }
    }
}

/// What the client should show for a completed import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// No recipe anywhere in the upload.
    Empty { skipped_pages: Vec<u32> },
    /// Exactly one recipe: navigate to it directly.
    Single(PageResult),
    /// Several recipes: show the summary.
    Multiple(ImportSummary),
}

/// Select the outcome branch by result count.
pub fn reconcile(results: &[PageResult], skipped_pages: &[u32]) -> ImportOutcome {
    let mut recipes = results.to_vec();
    recipes.sort_by_key(|r| r.page_number);

    let mut skipped_pages = skipped_pages.to_vec();
    skipped_pages.sort_unstable();
    skipped_pages.dedup();

    match recipes.len() {
        0 => ImportOutcome::Empty { skipped_pages },
        1 => ImportOutcome::Single(recipes.remove(0)),
        _ => ImportOutcome::Multiple(ImportSummary {
            recipes,
            skipped_pages,
        }),
    }
}

impl ImportOutcome {
    /// Outcome for a polled snapshot. `None` unless the job completed;
    /// failed and cancelled jobs are handled by the caller.
    pub fn from_snapshot(snapshot: &JobStatusResponse) -> Option<Self> {
        (snapshot.status == JobStatus::Completed)
            .then(|| reconcile(&snapshot.results, &snapshot.skipped_pages))
    }

    /// Outcome for a synchronous fast-path answer. `None` when the server
    /// created a job instead.
    pub fn from_fast_path(response: &CreateImportResponse) -> Option<Self> {
        match response {
            CreateImportResponse::Job { .. } => None,
            CreateImportResponse::Recipe { recipe_id, title } => Some(reconcile(
                &[PageResult {
                    page_number: 1,
                    recipe_id: recipe_id.clone(),
                    title: title.clone(),
                }],
                &[],
            )),
            CreateImportResponse::NoRecipe => Some(reconcile(&[], &[1])),
        }
    }

    pub fn recipe_count(&self) -> usize {
        match self {
            Self::Empty { .. } => 0,
            Self::Single(_) => 1,
            Self::Multiple(summary) => summary.recipes.len(),
        }
    }
}
