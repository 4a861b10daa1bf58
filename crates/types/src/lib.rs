// crates/types/src/lib.rs
//! Wire contracts shared by the larder server and its clients.
//!
//! Everything here is plain data: serde for JSON, ts-rs for the generated
//! frontend types (export gated behind the `codegen` feature).

pub mod api;
pub mod job;

pub use api::*;
pub use job::*;
