// crates/core/src/lib.rs
//! Pure import logic shared by the server and clients: upload validation,
//! the extraction capability seam, and result reconciliation.

pub mod extract;
pub mod mock_extractor;
pub mod paths;
pub mod reconcile;
pub mod validate;

pub use extract::{DecomposeError, ExtractedRecipe, PageOutcome, RecipeExtractor, SourceDocument};
pub use mock_extractor::MockExtractor;
pub use reconcile::{reconcile, ImportOutcome, ImportSummary};
pub use validate::{
    classify, validate_upload, verify_image_signature, FileClass, ImageFormat, UploadedFile,
    ValidationError, DOCUMENT_CONTENT_TYPE, MAX_UPLOAD_BYTES, MIN_SIGNATURE_LEN,
};
