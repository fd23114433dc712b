//! Declarative extraction rules.
//!
//! Per-site scraping knowledge lives in these data structures instead of
//! per-site code: a generic extractor and enricher interpret them. All
//! selector and regex compilation happens at construction time, so
//! resolution never fails on malformed expressions at run time.

use std::time::Duration;

use regex::Regex;
use scraper::Selector;
use url::Url;

use crate::error::PipelineError;

/// Ordered list of CSS selector fallbacks, tried in priority order.
///
/// Compiled once; an invalid expression is a construction-time error.
/// Resolution of a chain never fails: a total miss is `None`, since
/// markup drift across sources is expected, not exceptional.
#[derive(Debug, Clone)]
pub struct SelectorChain {
    exprs: Vec<String>,
    compiled: Vec<Selector>,
}

impl SelectorChain {
    pub fn new<I, S>(exprs: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let exprs: Vec<String> = exprs.into_iter().map(Into::into).collect();
        if exprs.is_empty() {
            return Err(PipelineError::Config(
                "selector chain must contain at least one expression".into(),
            ));
        }
        let compiled = exprs
            .iter()
            .map(|e| Selector::parse(e).map_err(|_| PipelineError::InvalidSelector(e.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { exprs, compiled })
    }

    /// The raw expressions, in priority order.
    pub fn exprs(&self) -> &[String] {
        &self.exprs
    }

    pub(crate) fn selectors(&self) -> &[Selector] {
        &self.compiled
    }
}

/// Where a field's value comes from on its matched element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Concatenated text content, whitespace-squeezed.
    Text,
    /// A named attribute, e.g. `href` or `datetime`.
    Attr(String),
}

/// How to pull one field out of a scope element.
///
/// Resolution order: chain → value source → optional regex capture →
/// optional date normalization → trim. Empty results count as absent.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub chain: SelectorChain,
    pub source: ValueSource,
    pub pattern: Option<Regex>,
    pub normalize_date: bool,
}

impl FieldRule {
    /// Field taken from element text.
    pub fn text(chain: SelectorChain) -> Self {
        Self {
            chain,
            source: ValueSource::Text,
            pattern: None,
            normalize_date: false,
        }
    }

    /// Field taken from a named attribute.
    pub fn attr(chain: SelectorChain, name: impl Into<String>) -> Self {
        Self {
            chain,
            source: ValueSource::Attr(name.into()),
            pattern: None,
            normalize_date: false,
        }
    }

    /// Keep only the regex capture (group 1 if present, else the whole
    /// match) of the raw value. No match counts as field absent.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, PipelineError> {
        let compiled =
            Regex::new(pattern).map_err(|e| PipelineError::InvalidPattern(e.to_string()))?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    /// Normalize the value to `%Y-%m-%d` when it parses as a date;
    /// unparseable values pass through unchanged.
    pub fn date_normalized(mut self) -> Self {
        self.normalize_date = true;
        self
    }
}

/// Identity key used by the deduplicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Normalized URL. The default.
    #[default]
    NormalizedUrl,
    /// (title, normalized URL) composite, for sources whose URLs carry
    /// unstable query parameters or session tokens.
    TitleAndUrl,
}

/// Everything the listing extractor needs for one source.
#[derive(Debug, Clone)]
pub struct ExtractionRule {
    /// Locates the item containers on the listing page.
    pub containers: SelectorChain,
    pub title: FieldRule,
    pub link: FieldRule,
    /// Date shown inline on the listing, when the source has one.
    pub date: Option<FieldRule>,
    /// Base for resolving relative hrefs; normally the listing page origin.
    pub base_url: Url,
    pub key: KeyPolicy,
}

impl ExtractionRule {
    pub fn new(containers: SelectorChain, title: FieldRule, link: FieldRule, base_url: Url) -> Self {
        Self {
            containers,
            title,
            link,
            date: None,
            base_url,
            key: KeyPolicy::default(),
        }
    }

    pub fn with_inline_date(mut self, date: FieldRule) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_key(mut self, key: KeyPolicy) -> Self {
        self.key = key;
        self
    }
}

/// How to recover the date from an item's own page.
#[derive(Debug, Clone)]
pub struct EnrichmentRule {
    pub date: FieldRule,
}

impl EnrichmentRule {
    pub fn new(date: FieldRule) -> Self {
        Self { date }
    }
}

/// When a rendered page counts as ready for extraction.
///
/// Explicit selector waits are preferred over fixed delays, which are
/// flaky; the delay variant exists because some highly dynamic sources
/// offer nothing better to wait on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReadinessPolicy {
    /// Wait until the given selector matches.
    WaitForSelector(String),
    /// Wait a fixed duration after navigation.
    FixedDelay(Duration),
    /// Wait for the navigation to settle. The default.
    #[default]
    DomContentLoaded,
}

/// Run-level knobs for one pipeline invocation.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum records kept after dedup.
    pub batch_size: usize,
    /// Enrichment parallelism; 1 means strict sequential detail visits.
    pub concurrency: usize,
    /// Per-navigation timeout, applied to the listing and to each
    /// detail page independently.
    pub nav_timeout: Duration,
    pub readiness: ReadinessPolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            concurrency: 1,
            nav_timeout: Duration::from_secs(30),
            readiness: ReadinessPolicy::default(),
        }
    }
}
