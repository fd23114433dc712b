use std::time::Duration;

use gleaner_core::error::PipelineError;
use gleaner_core::rules::ReadinessPolicy;
use gleaner_core::traits::Renderer;
use reqwest::Client;
use url::Url;

/// Plain HTTP renderer using reqwest.
///
/// Returns the document as served, without JavaScript execution. The
/// right choice for static listings and text-only/lite editions; use
/// [`BrowserRenderer`](crate::browser::BrowserRenderer) for pages that
/// assemble their content client-side.
///
/// Readiness policies presuppose a rendering engine and are meaningless
/// here: selector waits and fixed delays are logged and skipped, since
/// the document cannot change after the response is read. Pace requests
/// with [`ThrottledRenderer`](gleaner_core::throttle::ThrottledRenderer)
/// instead.
#[derive(Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new() -> Result<Self, PipelineError> {
        let client = Client::builder()
            .user_agent("gleaner/0.2 (article extraction pipeline)")
            .build()
            .map_err(|e| PipelineError::Renderer(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Renderer for HttpRenderer {
    async fn render(
        &self,
        url: &str,
        readiness: &ReadinessPolicy,
        timeout: Duration,
    ) -> Result<String, PipelineError> {
        validate_scheme(url)?;

        match readiness {
            ReadinessPolicy::WaitForSelector(selector) => {
                tracing::debug!(%selector, "selector wait has no effect without a browser; skipping");
            }
            ReadinessPolicy::FixedDelay(delay) => {
                tracing::debug!(
                    delay_ms = delay.as_millis() as u64,
                    "fixed delay has no effect without a browser; skipping"
                );
            }
            ReadinessPolicy::DomContentLoaded => {}
        }

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Timeout(timeout.as_secs())
                } else if e.is_connect() {
                    PipelineError::Navigation(format!("connection failed: {e}"))
                } else {
                    PipelineError::Navigation(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::Navigation(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| PipelineError::Navigation(format!("failed to read response body: {e}")))
    }
}

/// Only http/https are navigable; everything else is a config mistake.
fn validate_scheme(url: &str) -> Result<(), PipelineError> {
    let parsed =
        Url::parse(url).map_err(|e| PipelineError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(PipelineError::InvalidUrl(format!(
            "scheme '{scheme}' is not navigable (only http/https)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_http_schemes() {
        assert!(matches!(
            validate_scheme("file:///etc/passwd"),
            Err(PipelineError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_scheme("ftp://example.com/feed"),
            Err(PipelineError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_scheme("http://example.com").is_ok());
        assert!(validate_scheme("https://example.com/news").is_ok());
    }

    #[tokio::test]
    async fn test_fixed_delay_is_skipped() {
        // Nothing listens on port 1; the connect error must arrive well
        // before the configured delay would have elapsed.
        let renderer = HttpRenderer::new().unwrap();
        let started = std::time::Instant::now();
        let result = renderer
            .render(
                "http://127.0.0.1:1/",
                &ReadinessPolicy::FixedDelay(Duration::from_secs(30)),
                Duration::from_secs(5),
            )
            .await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_relative_url() {
        assert!(matches!(
            validate_scheme("/news/latest"),
            Err(PipelineError::InvalidUrl(_))
        ));
    }
}
