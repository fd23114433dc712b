use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use gleaner_core::error::PipelineError;
use gleaner_core::rules::ReadinessPolicy;
use gleaner_core::traits::Renderer;

/// Headless-browser renderer using Chromium via the Chrome DevTools
/// Protocol.
///
/// Unlike [`super::HttpRenderer`], this executes JavaScript before
/// returning the HTML, which many listing pages need before their item
/// containers exist at all.
///
/// A single Chromium process is shared across all clones of this struct;
/// each [`Renderer::render`] call opens a fresh tab, waits for the
/// configured readiness condition, grabs the rendered DOM, and closes
/// the tab on every exit path, so one item's crashed tab cannot corrupt
/// another's.
#[derive(Clone)]
pub struct BrowserRenderer {
    browser: Arc<Browser>,
}

impl BrowserRenderer {
    /// Launches a headless Chromium browser.
    ///
    /// Requires a Chromium / Chrome binary reachable via `$PATH` (or the
    /// default locations checked by `chromiumoxide`).
    pub async fn new() -> Result<Self, PipelineError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--no-first-run")
            .build()
            .map_err(|e| PipelineError::Renderer(format!("browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PipelineError::Renderer(format!("failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        Ok(Self {
            browser: Arc::new(browser),
        })
    }

    /// Locate a usable Chrome/Chromium binary.
    ///
    /// Snap's wrapper at `/snap/bin/chromium` strips unknown CLI flags
    /// and breaks headless mode, so the real binary inside the snap is
    /// tried first, then common system paths. `None` lets chromiumoxide
    /// do its own lookup. `CHROME_BIN` overrides everything.
    fn find_chrome_binary() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        let candidates: &[&str] = &[
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];
        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }

    async fn render_in_page(
        page: &Page,
        url: &str,
        readiness: &ReadinessPolicy,
    ) -> Result<String, PipelineError> {
        page.goto(url)
            .await
            .map_err(|e| PipelineError::Navigation(format!("failed to navigate to {url}: {e}")))?;

        match readiness {
            ReadinessPolicy::DomContentLoaded => {
                page.wait_for_navigation().await.map_err(|e| {
                    PipelineError::Navigation(format!("navigation did not settle: {e}"))
                })?;
            }
            ReadinessPolicy::FixedDelay(delay) => {
                tokio::time::sleep(*delay).await;
            }
            ReadinessPolicy::WaitForSelector(selector) => {
                // Poll until the selector appears; the per-navigation
                // timeout in `render` bounds this loop.
                while page.find_element(selector.as_str()).await.is_err() {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }

        page.content()
            .await
            .map_err(|e| PipelineError::Navigation(format!("failed to read page content: {e}")))
    }
}

impl Renderer for BrowserRenderer {
    async fn render(
        &self,
        url: &str,
        readiness: &ReadinessPolicy,
        timeout: Duration,
    ) -> Result<String, PipelineError> {
        // Fresh tab per navigation: the scoped page context.
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| PipelineError::Renderer(format!("failed to open page: {e}")))?;

        let outcome = match tokio::time::timeout(
            timeout,
            Self::render_in_page(&page, url, readiness),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(PipelineError::Timeout(timeout.as_secs())),
        };

        // Release the tab on success and failure alike.
        if let Err(e) = page.close().await {
            tracing::warn!(%url, "failed to close page: {e}");
        }

        outcome
    }
}
