//! Detail-page enrichment with per-item failure isolation.
//!
//! For each record missing its date, visit the record's own page and
//! resolve the enrichment field there. One slow or broken detail page
//! must not stall or fail the batch: every failure is absorbed into the
//! record as a sentinel, and the record is always kept.

use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use scraper::Html;

use crate::error::EnrichFailure;
use crate::models::Record;
use crate::pipeline::{PipelineEvent, PipelineReporter};
use crate::rules::{BatchConfig, EnrichmentRule, ReadinessPolicy};
use crate::traits::Renderer;

/// Enriches records missing a date by visiting their own pages.
pub struct DetailEnricher<R: Renderer> {
    renderer: R,
    rule: EnrichmentRule,
    config: BatchConfig,
}

impl<R: Renderer> DetailEnricher<R> {
    pub fn new(renderer: R, rule: EnrichmentRule, config: BatchConfig) -> Self {
        Self {
            renderer,
            rule,
            config,
        }
    }

    /// Enrich every record whose date is missing, in place.
    ///
    /// Item navigations are mutually independent and run with bounded
    /// parallelism (`concurrency`, clamped to ≥ 1; 1 degrades to strict
    /// sequential visits for sources that block concurrent sessions).
    /// Results are written back by original index, so record order is
    /// unchanged regardless of completion order.
    pub async fn enrich<P: PipelineReporter>(&self, records: &mut [Record], reporter: &P) {
        let pending: Vec<(usize, String)> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record.date.is_none())
            .map(|(index, record)| (index, record.url.to_string()))
            .collect();
        if pending.is_empty() {
            return;
        }

        let concurrency = self.config.concurrency.max(1);
        reporter.report(PipelineEvent::EnrichmentStarted {
            pending: pending.len(),
            concurrency,
        });

        let timeout = self.config.nav_timeout;
        let readiness = &self.config.readiness;
        let rule = &self.rule;
        let outcomes: Vec<(usize, Result<String, EnrichFailure>)> = stream::iter(pending)
            .map(|(index, url)| {
                let renderer = self.renderer.clone();
                async move {
                    let outcome =
                        enrich_one(&renderer, rule, readiness, timeout, &url).await;
                    (index, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (index, outcome) in outcomes {
            match outcome {
                Ok(date) => {
                    records[index].date = Some(date);
                    records[index].enriched = true;
                    reporter.report(PipelineEvent::ItemEnriched {
                        index,
                        url: records[index].url.as_str(),
                    });
                }
                Err(reason) => {
                    // Soft failure: sentinel stays, record stays.
                    records[index].enriched = false;
                    reporter.report(PipelineEvent::ItemSoftFailed {
                        index,
                        url: records[index].url.as_str(),
                        reason: &reason,
                    });
                }
            }
        }
    }
}

/// One bounded-timeout detail navigation plus field resolution.
async fn enrich_one<R: Renderer>(
    renderer: &R,
    rule: &EnrichmentRule,
    readiness: &ReadinessPolicy,
    timeout: Duration,
    url: &str,
) -> Result<String, EnrichFailure> {
    // The renderer gets the timeout too, but enforcing it here as well
    // guarantees expiry cancels only this item's navigation.
    let rendered = tokio::time::timeout(timeout, renderer.render(url, readiness, timeout)).await;
    let html = match rendered {
        Ok(Ok(html)) => html,
        Ok(Err(error)) => return Err(error.into()),
        Err(_) => return Err(EnrichFailure::Timeout(timeout.as_secs())),
    };
    resolve_detail_field(&html, rule).ok_or(EnrichFailure::FieldAbsent)
}

// Synchronous on purpose: the parsed document is not Send and must not
// live across an await.
fn resolve_detail_field(html: &str, rule: &EnrichmentRule) -> Option<String> {
    let document = Html::parse_document(html);
    rule.date.resolve(document.root_element())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TracingReporter;
    use crate::rules::{FieldRule, SelectorChain};
    use crate::testutil::MockRenderer;
    use url::Url;

    fn rule() -> EnrichmentRule {
        EnrichmentRule::new(
            FieldRule::attr(
                SelectorChain::new(["time[datetime]", ".published"]).unwrap(),
                "datetime",
            )
            .date_normalized(),
        )
    }

    fn record(title: &str, url: &str, date: Option<&str>) -> Record {
        Record {
            title: title.to_string(),
            url: Url::parse(url).unwrap(),
            date: date.map(str::to_string),
            enriched: false,
        }
    }

    fn detail_page(datetime: &str) -> String {
        format!(r#"<html><body><time datetime="{datetime}">d</time></body></html>"#)
    }

    fn config_with(concurrency: usize, timeout: Duration) -> BatchConfig {
        BatchConfig {
            concurrency,
            nav_timeout: timeout,
            ..BatchConfig::default()
        }
    }

    #[tokio::test]
    async fn enriches_missing_date_and_marks_flag() {
        let renderer = MockRenderer::new().with_page(
            "https://example.com/a",
            &detail_page("2025-05-06T10:00:00Z"),
        );
        let enricher = DetailEnricher::new(renderer, rule(), BatchConfig::default());
        let mut records = vec![record("A", "https://example.com/a", None)];

        enricher.enrich(&mut records, &TracingReporter).await;

        assert_eq!(records[0].date.as_deref(), Some("2025-05-06"));
        assert!(records[0].enriched);
    }

    #[tokio::test]
    async fn field_absent_is_soft_failure() {
        let renderer = MockRenderer::new()
            .with_page("https://example.com/a", "<html><body>no date</body></html>");
        let enricher = DetailEnricher::new(renderer, rule(), BatchConfig::default());
        let mut records = vec![record("A", "https://example.com/a", None)];

        enricher.enrich(&mut records, &TracingReporter).await;

        assert_eq!(records[0].date, None);
        assert!(!records[0].enriched);
    }

    #[tokio::test]
    async fn navigation_error_is_soft_failure() {
        let renderer = MockRenderer::new().with_error("https://example.com/a", "404");
        let enricher = DetailEnricher::new(renderer, rule(), BatchConfig::default());
        let mut records = vec![record("A", "https://example.com/a", None)];

        enricher.enrich(&mut records, &TracingReporter).await;

        assert_eq!(records[0].date, None);
        assert!(!records[0].enriched);
    }

    #[tokio::test]
    async fn timeout_converts_to_soft_failure() {
        let renderer = MockRenderer::new().with_hang("https://example.com/slow");
        let enricher = DetailEnricher::new(
            renderer,
            rule(),
            config_with(1, Duration::from_millis(50)),
        );
        let mut records = vec![record("A", "https://example.com/slow", None)];

        enricher.enrich(&mut records, &TracingReporter).await;

        assert_eq!(records[0].date, None);
        assert!(!records[0].enriched);
    }

    #[tokio::test]
    async fn failure_on_one_item_never_touches_siblings() {
        let renderer = MockRenderer::new()
            .with_page(
                "https://example.com/1",
                &detail_page("2025-05-01T00:00:00Z"),
            )
            .with_error("https://example.com/2", "gone")
            .with_page(
                "https://example.com/3",
                &detail_page("2025-05-03T00:00:00Z"),
            );
        let enricher = DetailEnricher::new(renderer, rule(), BatchConfig::default());
        let mut records = vec![
            record("1", "https://example.com/1", None),
            record("2", "https://example.com/2", None),
            record("3", "https://example.com/3", None),
        ];

        enricher.enrich(&mut records, &TracingReporter).await;

        assert_eq!(records[0].date.as_deref(), Some("2025-05-01"));
        assert!(!records[1].enriched);
        assert_eq!(records[1].date, None);
        assert_eq!(records[2].date.as_deref(), Some("2025-05-03"));
        assert_eq!(records.len(), 3);
    }

    #[tokio::test]
    async fn output_order_matches_input_under_parallelism() {
        // Item 1 is the slowest; with concurrency 4 it completes last,
        // but the write-back is positional.
        let renderer = MockRenderer::new()
            .with_delayed_page(
                "https://example.com/1",
                Duration::from_millis(120),
                &detail_page("2025-05-01T00:00:00Z"),
            )
            .with_delayed_page(
                "https://example.com/2",
                Duration::from_millis(40),
                &detail_page("2025-05-02T00:00:00Z"),
            )
            .with_page(
                "https://example.com/3",
                &detail_page("2025-05-03T00:00:00Z"),
            );
        let enricher = DetailEnricher::new(
            renderer,
            rule(),
            config_with(4, Duration::from_secs(5)),
        );
        let mut records = vec![
            record("1", "https://example.com/1", None),
            record("2", "https://example.com/2", None),
            record("3", "https://example.com/3", None),
        ];

        enricher.enrich(&mut records, &TracingReporter).await;

        let titles: Vec<_> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, ["1", "2", "3"]);
        assert_eq!(records[0].date.as_deref(), Some("2025-05-01"));
        assert_eq!(records[1].date.as_deref(), Some("2025-05-02"));
        assert_eq!(records[2].date.as_deref(), Some("2025-05-03"));
    }

    #[tokio::test]
    async fn records_with_date_are_not_visited() {
        let renderer = MockRenderer::new();
        let rendered = renderer.rendered.clone();
        let enricher = DetailEnricher::new(renderer, rule(), BatchConfig::default());
        let mut records = vec![record("A", "https://example.com/a", Some("2025-01-01"))];

        enricher.enrich(&mut records, &TracingReporter).await;

        assert!(rendered.lock().unwrap().is_empty());
        assert!(!records[0].enriched);
        assert_eq!(records[0].date.as_deref(), Some("2025-01-01"));
    }

    #[tokio::test]
    async fn concurrency_zero_is_clamped_to_sequential() {
        let renderer = MockRenderer::new().with_page(
            "https://example.com/a",
            &detail_page("2025-05-06T00:00:00Z"),
        );
        let enricher = DetailEnricher::new(renderer, rule(), config_with(0, Duration::from_secs(5)));
        let mut records = vec![record("A", "https://example.com/a", None)];

        enricher.enrich(&mut records, &TracingReporter).await;

        assert!(records[0].enriched);
    }
}
