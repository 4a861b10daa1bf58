// crates/server/src/jobs/mod.rs
//! Background processing of import jobs.
//!
//! Provides:
//! - `ImportRunner` — spawns and drives one processor per job
//! - `ActiveImports` — registry guaranteeing a single content writer per job
//! - `InlineResult` — outcome of the single-image fast path

pub mod runner;
pub mod state;
pub mod types;

pub use runner::{ImportRunner, INTERNAL_FAILURE_MESSAGE, NO_PAGES_MESSAGE};
pub use state::{ActiveImports, ActiveJob};
pub use types::{InlineError, InlineResult};
