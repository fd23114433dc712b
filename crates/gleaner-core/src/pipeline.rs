//! Run orchestration: listing fetch → extract → dedup → truncate →
//! enrich, with run-level state tracking and decoupled progress
//! reporting.

use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

use crate::dedup::dedup;
use crate::enrich::DetailEnricher;
use crate::error::{EnrichFailure, PipelineError};
use crate::extract::{ListingOutcome, extract_listing};
use crate::models::{RawCandidate, Record};
use crate::rules::{BatchConfig, EnrichmentRule, ExtractionRule};
use crate::traits::Renderer;

/// Pipeline run states, in order of traversal.
///
/// `Failed` is reserved for run-level faults (listing navigation, no
/// page context at all): an individual item's enrichment failure never
/// produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ListingFetched,
    Extracted,
    Deduplicated,
    Truncated,
    Enriching,
    Done,
    Failed,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub state: RunState,
    /// Final records, in listing order.
    pub records: Vec<Record>,
    /// Candidates extracted before dedup.
    pub raw_count: usize,
    /// Candidates surviving dedup, before truncation.
    pub unique_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Progress events emitted during a run, for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    RunStarted {
        run_id: Uuid,
        listing_url: &'a str,
    },
    ListingFetched {
        bytes: usize,
    },
    Extracted {
        raw: usize,
    },
    NoItemsFound,
    Deduplicated {
        before: usize,
        after: usize,
    },
    Truncated {
        kept: usize,
    },
    EnrichmentStarted {
        pending: usize,
        concurrency: usize,
    },
    ItemEnriched {
        index: usize,
        url: &'a str,
    },
    ItemSoftFailed {
        index: usize,
        url: &'a str,
        reason: &'a EnrichFailure,
    },
    RunCompleted {
        run_id: Uuid,
        records: usize,
    },
    RunFailed {
        run_id: Uuid,
        error: &'a PipelineError,
    },
}

/// Receives pipeline progress events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::RunStarted {
                run_id,
                listing_url,
            } => {
                tracing::info!(%run_id, %listing_url, "Run started");
            }
            PipelineEvent::ListingFetched { bytes } => {
                tracing::info!(%bytes, "Listing fetched");
            }
            PipelineEvent::Extracted { raw } => {
                tracing::info!(%raw, "Candidates extracted");
            }
            PipelineEvent::NoItemsFound => {
                tracing::warn!("No item containers matched; completing as empty");
            }
            PipelineEvent::Deduplicated { before, after } => {
                tracing::info!(%before, %after, "Candidates deduplicated");
            }
            PipelineEvent::Truncated { kept } => {
                tracing::info!(%kept, "Batch truncated");
            }
            PipelineEvent::EnrichmentStarted {
                pending,
                concurrency,
            } => {
                tracing::info!(%pending, %concurrency, "Enrichment started");
            }
            PipelineEvent::ItemEnriched { index, url } => {
                tracing::info!(%index, %url, "Item enriched");
            }
            PipelineEvent::ItemSoftFailed { index, url, reason } => {
                tracing::warn!(%index, %url, %reason, "Item enrichment soft-failed");
            }
            PipelineEvent::RunCompleted { run_id, records } => {
                tracing::info!(%run_id, %records, "Run completed");
            }
            PipelineEvent::RunFailed { run_id, error } => {
                tracing::error!(%run_id, %error, "Run failed");
            }
        }
    }
}

/// Orchestrates one listing run end to end.
///
/// Generic over the [`Renderer`] so tests run against canned documents.
/// The orchestrator performs no I/O beyond delegated navigation calls
/// and returns the finished records to its caller.
pub struct ListingPipeline<R: Renderer> {
    renderer: R,
    listing_url: Url,
    extraction: ExtractionRule,
    enrichment: Option<EnrichmentRule>,
    config: BatchConfig,
}

impl<R: Renderer> ListingPipeline<R> {
    pub fn new(renderer: R, listing_url: Url, extraction: ExtractionRule) -> Self {
        Self {
            renderer,
            listing_url,
            extraction,
            enrichment: None,
            config: BatchConfig::default(),
        }
    }

    /// Enable detail-page enrichment for records missing a date.
    pub fn with_enrichment(mut self, rule: EnrichmentRule) -> Self {
        self.enrichment = Some(rule);
        self
    }

    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Run with tracing-based progress reporting.
    pub async fn run(&self) -> Result<PipelineRun, PipelineError> {
        self.run_with_reporter(&TracingReporter).await
    }

    /// Run the full pipeline: fetch listing → extract → dedup →
    /// truncate → enrich.
    ///
    /// A listing-stage navigation fault is fatal and surfaced once as
    /// the run failure; enrichment failures are absorbed per item. The
    /// run therefore yields either a (possibly empty) record list or
    /// exactly one error.
    pub async fn run_with_reporter<P: PipelineReporter>(
        &self,
        reporter: &P,
    ) -> Result<PipelineRun, PipelineError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut state = RunState::Idle;
        reporter.report(PipelineEvent::RunStarted {
            run_id,
            listing_url: self.listing_url.as_str(),
        });

        // Idle → ListingFetched. The only fatal navigation in a run.
        let html = match self
            .renderer
            .render(
                self.listing_url.as_str(),
                &self.config.readiness,
                self.config.nav_timeout,
            )
            .await
        {
            Ok(html) => html,
            Err(error) => {
                advance(&mut state, RunState::Failed, run_id);
                reporter.report(PipelineEvent::RunFailed {
                    run_id,
                    error: &error,
                });
                return Err(error);
            }
        };
        advance(&mut state, RunState::ListingFetched, run_id);
        reporter.report(PipelineEvent::ListingFetched { bytes: html.len() });

        // ListingFetched → Extracted. Benign-empty is not fatal.
        let raw = match extract_listing(&html, &self.extraction) {
            ListingOutcome::NoItemsFound => {
                reporter.report(PipelineEvent::NoItemsFound);
                Vec::new()
            }
            ListingOutcome::Items(items) => {
                reporter.report(PipelineEvent::Extracted { raw: items.len() });
                items
            }
        };
        advance(&mut state, RunState::Extracted, run_id);
        let raw_count = raw.len();

        // Extracted → Deduplicated. Strictly before truncation so
        // duplicates never consume batch slots.
        let unique = dedup(raw, self.extraction.key);
        let unique_count = unique.len();
        advance(&mut state, RunState::Deduplicated, run_id);
        reporter.report(PipelineEvent::Deduplicated {
            before: raw_count,
            after: unique_count,
        });

        // Deduplicated → Truncated.
        let mut records: Vec<Record> = unique
            .into_iter()
            .take(self.config.batch_size)
            .map(RawCandidate::into_record)
            .collect();
        advance(&mut state, RunState::Truncated, run_id);
        reporter.report(PipelineEvent::Truncated {
            kept: records.len(),
        });

        // Truncated → Enriching → Done. Soft failures only from here on.
        if let Some(rule) = &self.enrichment {
            advance(&mut state, RunState::Enriching, run_id);
            let enricher =
                DetailEnricher::new(self.renderer.clone(), rule.clone(), self.config.clone());
            enricher.enrich(&mut records, reporter).await;
        }
        advance(&mut state, RunState::Done, run_id);
        reporter.report(PipelineEvent::RunCompleted {
            run_id,
            records: records.len(),
        });

        Ok(PipelineRun {
            run_id,
            state,
            records,
            raw_count,
            unique_count,
            started_at,
            finished_at: Utc::now(),
        })
    }
}

fn advance(state: &mut RunState, next: RunState, run_id: Uuid) {
    tracing::debug!(%run_id, from = ?*state, to = ?next, "Pipeline state");
    *state = next;
}
