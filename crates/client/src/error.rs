// crates/client/src/error.rs
use std::path::PathBuf;

use thiserror::Error;

/// Errors from one call to the import API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never got an answer (connect, timeout, broken body).
    #[error("Could not reach server: {0}")]
    Transport(String),

    /// Unknown job, or one that belongs to someone else.
    #[error("Import job not found")]
    NotFound,

    /// The server answered with an error status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl ApiError {
    /// Whether the same request may succeed if simply tried again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::NotFound => false,
            Self::Rejected { status, .. } => *status >= 500 || *status == 429,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Poll task stopped unexpectedly: {0}")]
    Aborted(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ApiError::Transport("reset".into()).is_retryable());
        assert!(ApiError::Rejected { status: 503, message: "busy".into() }.is_retryable());
        assert!(ApiError::Rejected { status: 429, message: "slow down".into() }.is_retryable());
        assert!(!ApiError::Rejected { status: 400, message: "invalid image data".into() }.is_retryable());
        assert!(!ApiError::NotFound.is_retryable());
    }

    #[test]
    fn test_rejected_displays_server_message() {
        let err = ApiError::Rejected {
            status: 400,
            message: "invalid image data".into(),
        };
        assert_eq!(err.to_string(), "invalid image data");
    }
}
