// crates/core/src/validate.rs
//! Upload validation run before any job or storage is consumed.
//!
//! Two checks: `classify` looks at the declared content type and size, and
//! `verify_image_signature` compares an image's leading bytes against the
//! magic numbers of the format it claims to be. Both are pure.

use larder_types::SourceKind;
use thiserror::Error;

/// Maximum upload size (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shortest payload that can carry any supported image signature
/// (WebP needs 12: `RIFF` + 4-byte size + `WEBP`).
pub const MIN_SIGNATURE_LEN: usize = 12;

/// Declared type accepted for multi-page documents.
pub const DOCUMENT_CONTENT_TYPE: &str = "application/pdf";

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Errors that reject an upload. The `Display` text is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File is empty")]
    Empty,

    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Unsupported file type: {0}. Allowed: JPEG, PNG, WebP, GIF, PDF")]
    UnsupportedType(String),

    #[error("invalid image data")]
    InvalidImageData,
}

/// Image formats accepted for recipe photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// Map a normalized content type to an image format.
    fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/gif" => Some(Self::Gif),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detect the format from leading bytes. Returns `None` for anything that
    /// doesn't start with a known signature.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&JPEG_SIGNATURE) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(&PNG_SIGNATURE) {
            Some(Self::Png)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
            Some(Self::WebP)
        } else {
            None
        }
    }
}

/// What an upload was classified as by its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Image(ImageFormat),
    Document,
}

impl FileClass {
    pub fn source_kind(&self) -> SourceKind {
        match self {
            Self::Image(_) => SourceKind::Image,
            Self::Document => SourceKind::Document,
        }
    }
}

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    /// Declared content type, as sent.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: None,
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lowercase, trim, and drop parameters: `"Image/PNG; q=1"` -> `"image/png"`.
fn normalize_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Classify an upload by declared type and size.
pub fn classify(file: &UploadedFile) -> Result<FileClass, ValidationError> {
    if file.is_empty() {
        return Err(ValidationError::Empty);
    }
    if file.len() > MAX_UPLOAD_BYTES {
        return Err(ValidationError::TooLarge {
            size: file.len(),
            max: MAX_UPLOAD_BYTES,
        });
    }

    let content_type = normalize_content_type(&file.content_type);
    if content_type == DOCUMENT_CONTENT_TYPE {
        return Ok(FileClass::Document);
    }
    ImageFormat::from_content_type(&content_type)
        .map(FileClass::Image)
        .ok_or_else(|| {
            let shown = if content_type.is_empty() {
                "unknown".to_string()
            } else {
                content_type
            };
            ValidationError::UnsupportedType(shown)
        })
}

/// Check that `bytes` really is the image format that was declared.
///
/// Payloads shorter than [`MIN_SIGNATURE_LEN`] are always rejected.
pub fn verify_image_signature(declared: ImageFormat, bytes: &[u8]) -> Result<(), ValidationError> {
    if bytes.len() < MIN_SIGNATURE_LEN {
        return Err(ValidationError::InvalidImageData);
    }
    match ImageFormat::detect(bytes) {
        Some(actual) if actual == declared => Ok(()),
        _ => Err(ValidationError::InvalidImageData),
    }
}

/// Full submission-time validation: classify, then verify image signatures.
pub fn validate_upload(file: &UploadedFile) -> Result<FileClass, ValidationError> {
    let class = classify(file)?;
    if let FileClass::Image(format) = class {
        verify_image_signature(format, &file.bytes)?;
    }
    Ok(class)
}
