// crates/server/src/error.rs
use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use larder_core::ValidationError;
use larder_db::DbError;
use larder_types::ErrorResponse;
use thiserror::Error;

use crate::jobs::InlineError;

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown job, or a job owned by someone else. Same response either way.
    #[error("Import job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid upload: {0}")]
    Validation(#[from] ValidationError),

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Missing caller identity")]
    Unauthorized,

    #[error("Extraction failed: {0}")]
    Extraction(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<InlineError> for ApiError {
    fn from(err: InlineError) -> Self {
        match err {
            InlineError::Extraction(reason) => ApiError::Extraction(reason),
            InlineError::Database(e) => ApiError::Database(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::JobNotFound(id) => {
                tracing::debug!(job_id = %id, "Import job not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::new("Import job not found"),
                )
            }
            ApiError::Validation(err) => {
                tracing::warn!(reason = %err, "Upload rejected");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Invalid upload", err.to_string()),
                )
            }
            ApiError::Multipart(err) => {
                tracing::warn!(error = %err, "Malformed multipart body");
                (
                    err.status(),
                    ErrorResponse::with_details("Malformed upload", err.body_text()),
                )
            }
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("Missing caller identity"),
            ),
            ApiError::Extraction(reason) => {
                tracing::warn!(reason = %reason, "Inline extraction failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorResponse::with_details("Extraction failed", reason.clone()),
                )
            }
            ApiError::Database(db_err) => {
                tracing::error!(error = %db_err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Database error"),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
