// crates/client/src/terminal.rs
//! `ImportView` for a terminal: an indicatif bar while polling, plain lines
//! for the outcome.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use larder_core::ImportSummary;
use larder_types::{JobProgressInfo, PageResult};

use crate::phase::FailureReason;
use crate::view::ImportView;

pub struct TerminalView {
    bar: ProgressBar,
}

impl TerminalView {
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(page_style());
        bar.set_message("Uploading...");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// A view that draws nothing, for scripted use.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

fn page_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner} {msg} [{bar:30}] {pos}/{len} pages")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .progress_chars("=> ")
}

/// `"Scones (p.1), Soda Bread (p.3)"`, the partial-results line.
fn partial_line(partial: &[PageResult]) -> String {
    partial
        .iter()
        .map(|r| format!("{} (p.{})", r.title, r.page_number))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ImportView for TerminalView {
    fn render_progress(&self, _job_id: &str, progress: &JobProgressInfo, partial: &[PageResult]) {
        if progress.total_pages > 0 {
            self.bar.set_length(u64::from(progress.total_pages));
            self.bar.set_position(u64::from(progress.current_page));
        }
        if partial.is_empty() {
            self.bar.set_message("Extracting");
        } else {
            self.bar.set_message(format!("Found: {}", partial_line(partial)));
        }
    }

    fn navigate_to_recipe(&self, recipe: &PageResult) {
        self.finish();
        println!("Imported \"{}\" -> recipe {}", recipe.title, recipe.recipe_id);
    }

    fn show_summary(&self, summary: &ImportSummary) {
        self.finish();
        println!("Imported {} recipes:", summary.recipes.len());
        for recipe in &summary.recipes {
            println!("  p.{:<4} {}  ({})", recipe.page_number, recipe.title, recipe.recipe_id);
        }
        if let Some(label) = summary.skipped_label() {
            println!("  {label}");
        }
    }

    fn show_no_recipe(&self) {
        self.finish();
        println!("No recipe found.");
    }

    fn show_error(&self, reason: &FailureReason) {
        self.finish();
        eprintln!("Import failed: {reason}");
    }

    fn reset(&self) {
        self.finish();
        eprintln!("Import cancelled.");
    }
}
