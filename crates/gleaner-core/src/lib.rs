pub mod config;
pub mod dedup;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod selector;
pub mod testutil;
pub mod throttle;
pub mod traits;

pub use config::{CompiledSite, SiteConfig};
pub use error::{EnrichFailure, PipelineError};
pub use extract::{ListingOutcome, extract_listing};
pub use models::{DATE_UNKNOWN, RawCandidate, Record};
pub use pipeline::{ListingPipeline, PipelineReporter, PipelineRun, RunState, TracingReporter};
pub use rules::{
    BatchConfig, EnrichmentRule, ExtractionRule, FieldRule, KeyPolicy, ReadinessPolicy,
    SelectorChain, ValueSource,
};
pub use traits::Renderer;
