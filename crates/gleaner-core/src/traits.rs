use std::future::Future;
use std::time::Duration;

use crate::error::PipelineError;
use crate::rules::ReadinessPolicy;

/// Produces a rendered HTML document for a URL.
///
/// The pipeline is generic over this trait so tests run against canned
/// documents and production runs against a real HTTP client or a headless
/// browser. Implementations must treat each call as an isolated
/// navigation: shared engine state is fine, shared page state is not.
pub trait Renderer: Send + Sync + Clone {
    /// Navigate to `url`, wait according to `readiness`, and return the
    /// rendered HTML. Must not take longer than `timeout`; the caller
    /// additionally enforces it from the outside.
    fn render(
        &self,
        url: &str,
        readiness: &ReadinessPolicy,
        timeout: Duration,
    ) -> impl Future<Output = Result<String, PipelineError>> + Send;
}
