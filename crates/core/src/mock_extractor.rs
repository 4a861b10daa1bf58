// crates/core/src/mock_extractor.rs
//! Scripted extractor for tests and local development.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::extract::{DecomposeError, PageOutcome, RecipeExtractor, SourceDocument};

/// Returns pre-scripted outcomes, one per page.
///
/// With [`MockExtractor::gated`], every `extract_page` call waits for a permit
/// released through the returned [`PageGate`], so tests can interleave
/// cancellation with page processing deterministically.
pub struct MockExtractor {
    pages: Vec<PageOutcome>,
    decompose_error: Option<DecomposeError>,
    delay: Option<Duration>,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<u32>>,
}

/// Releases gated page extractions one at a time.
#[derive(Clone)]
pub struct PageGate(Arc<Semaphore>);

impl PageGate {
    /// Allow `n` more pages to finish extracting.
    pub fn release(&self, n: usize) {
        self.0.add_permits(n);
    }
}

impl MockExtractor {
    pub fn new(pages: Vec<PageOutcome>) -> Self {
        Self {
            pages,
            decompose_error: None,
            delay: None,
            gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// An extractor whose `page_count` always fails.
    pub fn failing_decompose(error: DecomposeError) -> Self {
        Self {
            decompose_error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    /// Sleep before each page outcome.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make every page wait on a gate. Starts closed.
    pub fn gated(mut self) -> (Self, PageGate) {
        let semaphore = Arc::new(Semaphore::new(0));
        self.gate = Some(Arc::clone(&semaphore));
        (self, PageGate(semaphore))
    }

    /// Pages `extract_page` was called for, in call order.
    pub fn calls(&self) -> Vec<u32> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl RecipeExtractor for MockExtractor {
    async fn page_count(&self, _doc: &SourceDocument) -> Result<u32, DecomposeError> {
        match &self.decompose_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.pages.len() as u32),
        }
    }

    async fn extract_page(&self, _doc: &SourceDocument, page: u32) -> PageOutcome {
        match self.calls.lock() {
            Ok(mut calls) => calls.push(page),
            Err(poisoned) => poisoned.into_inner().push(page),
        }

        if let Some(gate) = &self.gate {
            match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return PageOutcome::Error("gate closed".into()),
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.pages
            .get(page.saturating_sub(1) as usize)
            .cloned()
            .unwrap_or_else(|| PageOutcome::Error(format!("no scripted outcome for page {page}")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
