// crates/client/src/lib.rs
//! Client side of recipe imports: submit a file, poll the job until it
//! settles, and hand the result to a view.

pub mod api;
pub mod error;
pub mod file;
pub mod phase;
pub mod poller;
pub mod terminal;
pub mod view;

pub use api::{HttpImportApi, ImportApi};
pub use error::{ApiError, ClientError};
pub use file::{content_type_for_path, load_upload};
pub use phase::{ClientPhase, FailureReason};
pub use poller::{CancelHandle, ImportSession, PollConfig, PollGuard};
pub use terminal::TerminalView;
pub use view::ImportView;
