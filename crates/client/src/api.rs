// crates/client/src/api.rs
//! Transport to the import endpoints.

use std::time::Duration;

use async_trait::async_trait;
use larder_core::UploadedFile;
use larder_types::{CreateImportResponse, ErrorResponse, JobStatusResponse, CALLER_HEADER};
use reqwest::{multipart, Client, Response, StatusCode};

use crate::error::ApiError;

/// The three calls a client makes against the import API.
#[async_trait]
pub trait ImportApi: Send + Sync {
    async fn submit(&self, file: &UploadedFile, fast_path: bool) -> Result<CreateImportResponse, ApiError>;

    async fn status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError>;

    /// Succeeds for any job id the server accepts the request for, whether or
    /// not the cancel applied.
    async fn cancel(&self, job_id: &str) -> Result<(), ApiError>;
}

pub struct HttpImportApi {
    client: Client,
    base_url: String,
    user: String,
}

impl HttpImportApi {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:47910`.
    pub fn new(base_url: &str, user: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user: user.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base_url)
    }
}

/// Map a non-success response to an `ApiError`, preferring the server's
/// `ErrorResponse` message.
async fn error_from(response: Response) -> ApiError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return ApiError::NotFound;
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&text)
        .map(|body| body.message().to_string())
        .unwrap_or_else(|_| {
            if text.trim().is_empty() {
                status.to_string()
            } else {
                text
            }
        });
    ApiError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl ImportApi for HttpImportApi {
    async fn submit(&self, file: &UploadedFile, fast_path: bool) -> Result<CreateImportResponse, ApiError> {
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone().unwrap_or_else(|| "upload".to_string()))
            .mime_str(&file.content_type)
            .map_err(|_| ApiError::Rejected {
                status: 400,
                message: format!("Unsupported file type: {}", file.content_type),
            })?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("fastPath", fast_path.to_string());

        tracing::debug!(size = file.len(), content_type = %file.content_type, fast_path, "Submitting import");

        let response = self
            .client
            .post(self.url("/imports"))
            .header(CALLER_HEADER, &self.user)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatusResponse, ApiError> {
        let response = self
            .client
            .get(self.url(&format!("/imports/{job_id}")))
            .header(CALLER_HEADER, &self.user)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ApiError> {
        let response = self
            .client
            .post(self.url(&format!("/imports/{job_id}/cancel")))
            .header(CALLER_HEADER, &self.user)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        Ok(())
    }
}
