//! Listing-page extraction: rendered HTML + rule → raw candidates.

use scraper::Html;

use crate::models::RawCandidate;
use crate::rules::ExtractionRule;

/// Result of one extraction pass over a listing document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingOutcome {
    /// Candidates in document order. May be empty if every container was
    /// missing a mandatory field.
    Items(Vec<RawCandidate>),
    /// The container chain matched nothing at all. Benign, but distinct
    /// from per-field absence so the caller can decide to retry with a
    /// longer readiness wait.
    NoItemsFound,
}

impl ListingOutcome {
    pub fn into_items(self) -> Vec<RawCandidate> {
        match self {
            ListingOutcome::Items(items) => items,
            ListingOutcome::NoItemsFound => Vec::new(),
        }
    }
}

/// Extract raw candidates from a rendered listing document.
///
/// Items missing a title or a resolvable absolute URL are dropped
/// silently; partial pages are expected, not errors. Output is in
/// document order, not yet deduplicated or truncated.
pub fn extract_listing(html: &str, rule: &ExtractionRule) -> ListingOutcome {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let containers = rule.containers.all_matches(root);
    if containers.is_empty() {
        tracing::debug!(
            chain = ?rule.containers.exprs(),
            "no item containers matched"
        );
        return ListingOutcome::NoItemsFound;
    }

    let mut items = Vec::with_capacity(containers.len());
    for container in containers {
        let Some(title) = rule.title.resolve(container) else {
            tracing::debug!("candidate dropped: title absent");
            continue;
        };
        let Some(href) = rule.link.resolve(container) else {
            tracing::debug!(%title, "candidate dropped: link absent");
            continue;
        };
        let Ok(url) = rule.base_url.join(&href) else {
            tracing::debug!(%title, %href, "candidate dropped: unresolvable link");
            continue;
        };
        let date = rule.date.as_ref().and_then(|field| field.resolve(container));
        items.push(RawCandidate { title, url, date });
    }

    ListingOutcome::Items(items)
}
