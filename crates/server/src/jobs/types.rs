// crates/server/src/jobs/types.rs
//! Types for the import job system.

use larder_db::{DbError, RecipeRow};
use thiserror::Error;

/// Outcome of extracting a single image inline (the fast path).
#[derive(Debug, Clone, PartialEq)]
pub enum InlineResult {
    Recipe(RecipeRow),
    NoRecipe,
}

#[derive(Debug, Error)]
pub enum InlineError {
    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error(transparent)]
    Database(#[from] DbError),
}
