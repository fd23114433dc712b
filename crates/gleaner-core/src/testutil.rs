//! Test utilities: mock implementations of the renderer and reporter.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks
//! use `Arc<Mutex<_>>` for interior mutability, allowing test assertions
//! on recorded calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::PipelineError;
use crate::pipeline::{PipelineEvent, PipelineReporter};
use crate::rules::ReadinessPolicy;
use crate::traits::Renderer;

#[derive(Debug, Clone)]
enum MockResponse {
    Html(String),
    DelayedHtml(Duration, String),
    Error(String),
    /// Never completes within any realistic test timeout.
    Hang,
}

/// Mock renderer serving canned documents per URL.
///
/// URLs without a configured response fail with a navigation error.
/// Every render call is recorded in `rendered` for assertions on which
/// pages the pipeline actually visited.
#[derive(Clone, Default)]
pub struct MockRenderer {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    pub rendered: Arc<Mutex<Vec<String>>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for `url`.
    pub fn with_page(self, url: &str, html: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), MockResponse::Html(html.to_string()));
        self
    }

    /// Serve `html` for `url` after an artificial delay.
    pub fn with_delayed_page(self, url: &str, delay: Duration, html: &str) -> Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            MockResponse::DelayedHtml(delay, html.to_string()),
        );
        self
    }

    /// Fail navigation to `url` with the given message.
    pub fn with_error(self, url: &str, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), MockResponse::Error(message.to_string()));
        self
    }

    /// Navigation to `url` hangs until the caller's timeout fires.
    pub fn with_hang(self, url: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), MockResponse::Hang);
        self
    }
}

impl Renderer for MockRenderer {
    async fn render(
        &self,
        url: &str,
        _readiness: &ReadinessPolicy,
        _timeout: Duration,
    ) -> Result<String, PipelineError> {
        self.rendered.lock().unwrap().push(url.to_string());
        // Copy the response out so the lock is not held across an await.
        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            None => Err(PipelineError::Navigation(format!(
                "no mock response for {url}"
            ))),
            Some(MockResponse::Html(html)) => Ok(html),
            Some(MockResponse::DelayedHtml(delay, html)) => {
                tokio::time::sleep(delay).await;
                Ok(html)
            }
            Some(MockResponse::Error(message)) => Err(PipelineError::Navigation(message)),
            Some(MockResponse::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PipelineError::Navigation("hang elapsed".into()))
            }
        }
    }
}

/// Mock reporter that records event labels.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PipelineReporter for MockReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        let label = match &event {
            PipelineEvent::RunStarted { .. } => "RunStarted",
            PipelineEvent::ListingFetched { .. } => "ListingFetched",
            PipelineEvent::Extracted { .. } => "Extracted",
            PipelineEvent::NoItemsFound => "NoItemsFound",
            PipelineEvent::Deduplicated { .. } => "Deduplicated",
            PipelineEvent::Truncated { .. } => "Truncated",
            PipelineEvent::EnrichmentStarted { .. } => "EnrichmentStarted",
            PipelineEvent::ItemEnriched { .. } => "ItemEnriched",
            PipelineEvent::ItemSoftFailed { .. } => "ItemSoftFailed",
            PipelineEvent::RunCompleted { .. } => "RunCompleted",
            PipelineEvent::RunFailed { .. } => "RunFailed",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}
