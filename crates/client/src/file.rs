// crates/client/src/file.rs
//! Turning a path on disk into an upload.

use std::path::Path;

use larder_core::UploadedFile;

use crate::error::ClientError;

/// Content type implied by a file extension. Unknown extensions fall back to
/// `application/octet-stream`, which the server rejects with a clear reason.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Read a file for upload. `content_type` overrides the extension guess.
pub async fn load_upload(path: &Path, content_type: Option<&str>) -> Result<UploadedFile, ClientError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| ClientError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let content_type = content_type.unwrap_or_else(|| content_type_for_path(path));
    Ok(UploadedFile {
        file_name: path.file_name().and_then(|n| n.to_str()).map(str::to_string),
        content_type: content_type.to_string(),
        bytes,
    })
}
