use thiserror::Error;

/// Run-level error types for the extraction pipeline.
///
/// Only the listing stage treats these as fatal; the enrichment stage
/// converts every failure into a per-item [`EnrichFailure`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Navigation to a page failed (DNS, connection, HTTP status, render fault).
    #[error("navigation error: {0}")]
    Navigation(String),

    /// Navigation did not complete within the configured timeout.
    #[error("navigation timed out after {0} seconds")]
    Timeout(u64),

    /// The renderer itself could not provide a page context at all
    /// (e.g. browser launch failure).
    #[error("renderer error: {0}")]
    Renderer(String),

    /// A selector expression failed to compile.
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    /// A post-processing regex failed to compile.
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),

    /// A URL could not be parsed as an absolute URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Site configuration is malformed or incomplete.
    #[error("config error: {0}")]
    Config(String),

    /// JSON serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why a single record could not be enriched.
///
/// These are soft failures: the record is kept with its date sentinel
/// and `enriched = false`, and siblings are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichFailure {
    /// The detail-page navigation did not finish in time.
    #[error("enrichment timed out after {0} seconds")]
    Timeout(u64),

    /// The detail-page navigation faulted.
    #[error("enrichment navigation failed: {0}")]
    Navigation(String),

    /// The page rendered but none of the field's selectors matched.
    #[error("field not found on detail page")]
    FieldAbsent,
}

impl From<PipelineError> for EnrichFailure {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Timeout(secs) => EnrichFailure::Timeout(secs),
            other => EnrichFailure::Navigation(other.to_string()),
        }
    }
}
