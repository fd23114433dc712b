//! Per-site configuration: declarative JSON compiled into rules.
//!
//! A site file carries everything source-specific (the listing URL and
//! the selector chains) as data, so adding a source means adding a
//! config file, not code. Compilation validates every selector, pattern,
//! and URL up front; a run never sees a malformed rule.

use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::error::PipelineError;
use crate::rules::{
    BatchConfig, EnrichmentRule, ExtractionRule, FieldRule, KeyPolicy, ReadinessPolicy,
    SelectorChain,
};

/// One field as written in a site file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct FieldConfig {
    /// Selector fallbacks in priority order.
    pub selectors: Vec<String>,
    /// Attribute to read; element text when absent.
    #[serde(default)]
    pub attr: Option<String>,
    /// Regex applied to the raw value; capture group 1 is kept.
    #[serde(default)]
    pub pattern: Option<String>,
    /// Normalize the value to `%Y-%m-%d` when it parses as a date.
    #[serde(default)]
    pub as_date: bool,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct ExtractionConfig {
    /// Item-container selector fallbacks.
    pub container: Vec<String>,
    pub title: FieldConfig,
    pub link: FieldConfig,
    #[serde(default)]
    pub date: Option<FieldConfig>,
    #[serde(default)]
    pub key: KeyPolicy,
    /// Base for relative links; defaults to the listing URL.
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct EnrichmentConfig {
    pub date: FieldConfig,
}

/// Readiness as written in a site file: `{"wait_for": ".cards"}`,
/// `{"delay_ms": 500}`, or `"dom_content_loaded"`.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessConfig {
    WaitFor(String),
    DelayMs(u64),
    DomContentLoaded,
}

impl From<&ReadinessConfig> for ReadinessPolicy {
    fn from(config: &ReadinessConfig) -> Self {
        match config {
            ReadinessConfig::WaitFor(selector) => {
                ReadinessPolicy::WaitForSelector(selector.clone())
            }
            ReadinessConfig::DelayMs(ms) => ReadinessPolicy::FixedDelay(Duration::from_millis(*ms)),
            ReadinessConfig::DomContentLoaded => ReadinessPolicy::DomContentLoaded,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    pub size: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub readiness: ReadinessConfig,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            size: 10,
            concurrency: 1,
            timeout_secs: 30,
            readiness: ReadinessConfig::DomContentLoaded,
        }
    }
}

/// A site file as parsed from JSON.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SiteConfig {
    /// Human-readable source name (e.g. "cnn-lite").
    pub name: String,
    pub listing_url: String,
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub enrichment: Option<EnrichmentConfig>,
    #[serde(default)]
    pub batch: BatchSettings,
}

/// A validated, compiled site ready to run.
#[derive(Debug, Clone)]
pub struct CompiledSite {
    pub name: String,
    pub listing_url: Url,
    pub extraction: ExtractionRule,
    pub enrichment: Option<EnrichmentRule>,
    pub batch: BatchConfig,
}

impl SiteConfig {
    /// Read and parse a site file.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("failed to read site file {}: {e}", path.display()))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Config(format!("invalid JSON in site file {}: {e}", path.display()))
        })
    }

    /// Validate and compile into runnable rules.
    pub fn compile(&self) -> Result<CompiledSite, PipelineError> {
        let listing_url = Url::parse(&self.listing_url)
            .map_err(|e| PipelineError::InvalidUrl(format!("{}: {e}", self.listing_url)))?;

        let base_url = match &self.extraction.base_url {
            Some(base) => Url::parse(base)
                .map_err(|e| PipelineError::InvalidUrl(format!("{base}: {e}")))?,
            None => listing_url.clone(),
        };

        let mut extraction = ExtractionRule::new(
            SelectorChain::new(self.extraction.container.clone())?,
            compile_field(&self.extraction.title)?,
            compile_field(&self.extraction.link)?,
            base_url,
        )
        .with_key(self.extraction.key);
        if let Some(date) = &self.extraction.date {
            extraction = extraction.with_inline_date(compile_field(date)?);
        }

        let enrichment = self
            .enrichment
            .as_ref()
            .map(|config| Ok::<_, PipelineError>(EnrichmentRule::new(compile_field(&config.date)?)))
            .transpose()?;

        let batch = BatchConfig {
            batch_size: self.batch.size,
            concurrency: self.batch.concurrency,
            nav_timeout: Duration::from_secs(self.batch.timeout_secs),
            readiness: (&self.batch.readiness).into(),
        };

        Ok(CompiledSite {
            name: self.name.clone(),
            listing_url,
            extraction,
            enrichment,
            batch,
        })
    }
}

fn compile_field(config: &FieldConfig) -> Result<FieldRule, PipelineError> {
    let chain = SelectorChain::new(config.selectors.clone())?;
    let mut rule = match &config.attr {
        Some(attr) => FieldRule::attr(chain, attr),
        None => FieldRule::text(chain),
    };
    if let Some(pattern) = &config.pattern {
        rule = rule.with_pattern(pattern)?;
    }
    if config.as_date {
        rule = rule.date_normalized();
    }
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ValueSource;

    const SAMPLE: &str = r#"{
        "name": "example-news",
        "listing_url": "https://news.example.com/latest",
        "extraction": {
            "container": [".card", "article"],
            "title": { "selectors": ["h2 a", "h2"] },
            "link": { "selectors": ["h2 a", "a"], "attr": "href" },
            "date": { "selectors": ["time"], "attr": "datetime", "as_date": true },
            "key": "title_and_url"
        },
        "enrichment": {
            "date": { "selectors": ["time[datetime]", ".published"], "attr": "datetime", "as_date": true }
        },
        "batch": {
            "size": 5,
            "concurrency": 2,
            "timeout_secs": 10,
            "readiness": { "wait_for": ".card" }
        }
    }"#;

    #[test]
    fn test_full_config_compiles() {
        let config: SiteConfig = serde_json::from_str(SAMPLE).unwrap();
        let site = config.compile().unwrap();

        assert_eq!(site.name, "example-news");
        assert_eq!(site.listing_url.as_str(), "https://news.example.com/latest");
        assert_eq!(site.extraction.containers.exprs(), [".card", "article"]);
        assert_eq!(site.extraction.key, KeyPolicy::TitleAndUrl);
        assert_eq!(
            site.extraction.link.source,
            ValueSource::Attr("href".into())
        );
        assert!(site.extraction.date.is_some());
        assert!(site.enrichment.is_some());
        assert_eq!(site.batch.batch_size, 5);
        assert_eq!(site.batch.concurrency, 2);
        assert_eq!(site.batch.nav_timeout, Duration::from_secs(10));
        assert_eq!(
            site.batch.readiness,
            ReadinessPolicy::WaitForSelector(".card".into())
        );
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let minimal = r#"{
            "name": "minimal",
            "listing_url": "https://example.com/",
            "extraction": {
                "container": ["li"],
                "title": { "selectors": ["a"] },
                "link": { "selectors": ["a"], "attr": "href" }
            }
        }"#;
        let config: SiteConfig = serde_json::from_str(minimal).unwrap();
        let site = config.compile().unwrap();

        assert_eq!(site.batch.batch_size, 10);
        assert_eq!(site.batch.concurrency, 1);
        assert_eq!(site.batch.readiness, ReadinessPolicy::DomContentLoaded);
        assert_eq!(site.extraction.key, KeyPolicy::NormalizedUrl);
        assert!(site.enrichment.is_none());
        // base_url defaults to the listing URL.
        assert_eq!(site.extraction.base_url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_delay_readiness_variant() {
        let config: ReadinessConfig = serde_json::from_str(r#"{ "delay_ms": 750 }"#).unwrap();
        assert_eq!(
            ReadinessPolicy::from(&config),
            ReadinessPolicy::FixedDelay(Duration::from_millis(750))
        );
    }

    #[test]
    fn test_invalid_selector_fails_compile_not_run() {
        let bad = r#"{
            "name": "bad",
            "listing_url": "https://example.com/",
            "extraction": {
                "container": ["li["],
                "title": { "selectors": ["a"] },
                "link": { "selectors": ["a"], "attr": "href" }
            }
        }"#;
        let config: SiteConfig = serde_json::from_str(bad).unwrap();
        let err = config.compile().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSelector(_)));
    }

    #[test]
    fn test_invalid_listing_url_fails_compile() {
        let bad = r#"{
            "name": "bad",
            "listing_url": "not a url",
            "extraction": {
                "container": ["li"],
                "title": { "selectors": ["a"] },
                "link": { "selectors": ["a"], "attr": "href" }
            }
        }"#;
        let config: SiteConfig = serde_json::from_str(bad).unwrap();
        let err = config.compile().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidUrl(_)));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("example.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = SiteConfig::load(&path).unwrap();
        assert_eq!(config.name, "example-news");
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = SiteConfig::load(Path::new("/nonexistent/site.json")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn test_load_invalid_json_is_config_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = SiteConfig::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
        assert!(err.to_string().contains("invalid JSON"));
    }
}
