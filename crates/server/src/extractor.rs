// crates/server/src/extractor.rs
//! `RecipeExtractor` backed by an external extraction service over HTTP.
//!
//! Wire contract (raw upload bytes as the request body, declared type in
//! `Content-Type`):
//! - `POST {base}/page-count` -> `{"pages": n}`; 422 means unreadable
//! - `POST {base}/extract?page=N` -> `{"recipe": {...}}`, `{"recipe": null}`
//!   or 204 when the page holds no recipe

use std::time::Duration;

use async_trait::async_trait;
use larder_core::{DecomposeError, ExtractedRecipe, PageOutcome, RecipeExtractor, SourceDocument};
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder, StatusCode};
use serde::Deserialize;

/// Header carrying the job id, for correlating service-side logs.
pub const JOB_ID_HEADER: &str = "x-larder-job";

pub struct HttpRecipeExtractor {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct PageCountResponse {
    pages: u32,
}

#[derive(Deserialize)]
struct ExtractResponse {
    recipe: Option<ExtractedRecipe>,
}

impl HttpRecipeExtractor {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn post(&self, path: &str, doc: &SourceDocument) -> RequestBuilder {
        let mut request = self
            .client
            .post(format!("{}{path}", self.base_url))
            .header(CONTENT_TYPE, &doc.content_type)
            .body(doc.bytes.clone());
        if let Some(job_id) = &doc.job_id {
            request = request.header(JOB_ID_HEADER, job_id);
        }
        request
    }
}

#[async_trait]
impl RecipeExtractor for HttpRecipeExtractor {
    async fn page_count(&self, doc: &SourceDocument) -> Result<u32, DecomposeError> {
        let response = self
            .post("/page-count", doc)
            .send()
            .await
            .map_err(|e| DecomposeError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let text = response.text().await.unwrap_or_default();
            return Err(DecomposeError::Unreadable(if text.is_empty() {
                "document rejected by extraction service".to_string()
            } else {
                text
            }));
        }
        if !status.is_success() {
            return Err(DecomposeError::Unavailable(format!(
                "extraction service returned {status}"
            )));
        }

        let body: PageCountResponse = response
            .json()
            .await
            .map_err(|e| DecomposeError::Unavailable(format!("malformed page count: {e}")))?;
        match body.pages {
            0 => Err(DecomposeError::NoPages),
            n => Ok(n),
        }
    }

    async fn extract_page(&self, doc: &SourceDocument, page: u32) -> PageOutcome {
        let response = match self
            .post(&format!("/extract?page={page}"), doc)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return PageOutcome::Error(format!("extraction request failed: {e}")),
        };

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return PageOutcome::NoRecipe;
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!(page, %status, body = %text, "Extraction service error body");
            return PageOutcome::Error(format!("extraction service returned {status}"));
        }

        match response.json::<ExtractResponse>().await {
            Ok(ExtractResponse {
                recipe: Some(recipe),
            }) => PageOutcome::Recipe(recipe),
            Ok(ExtractResponse { recipe: None }) => PageOutcome::NoRecipe,
            Err(e) => PageOutcome::Error(format!("malformed extraction response: {e}")),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
