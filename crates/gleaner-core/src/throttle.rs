//! Per-origin pacing for outbound navigations.
//!
//! Wraps any [`Renderer`] so consecutive navigations to one origin are
//! spaced at least a configured interval apart. Concurrent enrichment
//! tasks share one schedule: each navigation reserves the origin's next
//! free slot up front, so parallel visits to one host queue instead of
//! all measuring from the same last visit.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::error::PipelineError;
use crate::rules::ReadinessPolicy;
use crate::traits::Renderer;

/// Pacing settings for [`ThrottledRenderer`].
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Minimum spacing between navigations to one origin.
    pub delay: Duration,
    /// Upper bound of the random extra spacing added per navigation.
    /// `Duration::ZERO` disables it.
    pub jitter: Duration,
}

impl ThrottleConfig {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Spacing charged for one navigation: base delay plus jitter.
    fn spacing(&self) -> Duration {
        self.delay + Duration::from_millis(jitter_ms(self.jitter.as_millis() as u64))
    }
}

impl Default for ThrottleConfig {
    /// 1 second spacing, up to 500ms jitter.
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
        }
    }
}

/// [`Renderer`] wrapper enforcing per-origin spacing.
///
/// URLs without a host (and unparseable ones) pass straight through;
/// the inner renderer is the one that rejects them.
#[derive(Clone)]
pub struct ThrottledRenderer<R> {
    inner: R,
    config: ThrottleConfig,
    next_slot: Arc<Mutex<HashMap<String, Instant>>>,
}

impl<R: Renderer> ThrottledRenderer<R> {
    pub fn new(inner: R, config: ThrottleConfig) -> Self {
        Self {
            inner,
            config,
            next_slot: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reserve the next free slot for `origin` and wait until it opens.
    ///
    /// The reservation happens under the lock, before sleeping, and the
    /// lock is released while waiting: concurrent navigations to one
    /// origin get consecutive slots, navigations to other origins are
    /// never blocked.
    async fn acquire_slot(&self, origin: String) {
        let start = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let start = slots
                .get(&origin)
                .copied()
                .filter(|slot| *slot > now)
                .unwrap_or(now);
            slots.insert(origin, start + self.config.spacing());
            start
        };
        if start > Instant::now() {
            tokio::time::sleep_until(start).await;
        }
    }
}

/// Scheduling key for a URL. `None` for URLs with no host, which have
/// nothing to be polite to.
fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str()?;
    Some(parsed.origin().ascii_serialization())
}

impl<R: Renderer> Renderer for ThrottledRenderer<R> {
    async fn render(
        &self,
        url: &str,
        readiness: &ReadinessPolicy,
        timeout: Duration,
    ) -> Result<String, PipelineError> {
        if let Some(origin) = origin_of(url) {
            self.acquire_slot(origin).await;
        }
        self.inner.render(url, readiness, timeout).await
    }
}

// Rand-free jitter: the clock's nanoseconds pushed through the
// splitmix64 finalizer.
fn jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let mut z = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    (z ^ (z >> 31)) % max_ms
}
