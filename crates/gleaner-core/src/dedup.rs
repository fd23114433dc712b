//! Candidate deduplication, first occurrence wins.
//!
//! The orchestrator runs this strictly before truncating to the batch
//! size; truncating first would waste batch slots on duplicates.

use std::collections::HashSet;

use url::Url;

use crate::models::RawCandidate;
use crate::rules::KeyPolicy;

/// Remove duplicate candidates by the configured identity key, keeping
/// the first occurrence and preserving input order.
pub fn dedup(candidates: Vec<RawCandidate>, policy: KeyPolicy) -> Vec<RawCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(dedup_key(candidate, policy)))
        .collect()
}

/// Identity key for one candidate under the given policy.
pub fn dedup_key(candidate: &RawCandidate, policy: KeyPolicy) -> String {
    match policy {
        KeyPolicy::NormalizedUrl => normalize_url(&candidate.url),
        // Unit separator keeps "a" + "bc" distinct from "ab" + "c".
        KeyPolicy::TitleAndUrl => {
            format!("{}\u{1f}{}", candidate.title, normalize_url(&candidate.url))
        }
    }
}

/// Canonical string form of a URL for identity comparison: fragment
/// dropped, trailing slash stripped off non-root paths. Scheme and host
/// are already lowercased by the `url` crate at parse time.
pub fn normalize_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    // Strip the slash on the path itself so a query or other trailing
    // components don't mask it.
    let trimmed = match url.path() {
        path if path.ends_with('/') && path != "/" => Some(path[..path.len() - 1].to_string()),
        _ => None,
    };
    if let Some(path) = trimmed {
        url.set_path(&path);
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(title: &str, url: &str) -> RawCandidate {
        RawCandidate {
            title: title.to_string(),
            url: Url::parse(url).unwrap(),
            date: None,
        }
    }

    #[test]
    fn test_first_occurrence_wins_order_preserved() {
        let raw = vec![
            candidate("A", "https://example.com/1"),
            candidate("B", "https://example.com/2"),
            candidate("A", "https://example.com/1"),
        ];
        let unique = dedup(raw, KeyPolicy::NormalizedUrl);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].title, "A");
        assert_eq!(unique[1].title, "B");
    }

    #[test]
    fn test_no_two_outputs_share_a_key() {
        let raw = vec![
            candidate("A", "https://example.com/x"),
            candidate("B", "https://example.com/x#comments"),
            candidate("C", "https://example.com/x/"),
            candidate("D", "https://example.com/y"),
        ];
        let unique = dedup(raw, KeyPolicy::NormalizedUrl);
        let keys: Vec<_> = unique
            .iter()
            .map(|c| dedup_key(c, KeyPolicy::NormalizedUrl))
            .collect();
        let distinct: HashSet<_> = keys.iter().collect();
        assert_eq!(keys.len(), distinct.len());
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_normalize_url_drops_fragment_and_trailing_slash() {
        let url = Url::parse("https://Example.com/news/item/#top").unwrap();
        assert_eq!(normalize_url(&url), "https://example.com/news/item");
        // Root path keeps its slash.
        let root = Url::parse("https://example.com/").unwrap();
        assert_eq!(normalize_url(&root), "https://example.com/");
    }

    #[test]
    fn test_trailing_slash_normalized_when_query_present() {
        let with_slash = Url::parse("https://example.com/a/?q=1").unwrap();
        let without = Url::parse("https://example.com/a?q=1").unwrap();
        assert_eq!(normalize_url(&with_slash), normalize_url(&without));

        let raw = vec![
            candidate("A", "https://example.com/a/?q=1"),
            candidate("A", "https://example.com/a?q=1"),
        ];
        assert_eq!(dedup(raw, KeyPolicy::NormalizedUrl).len(), 1);
    }

    #[test]
    fn test_composite_key_separates_same_url_different_title() {
        let raw = vec![
            candidate("Morning edition", "https://example.com/feed?id=1"),
            candidate("Evening edition", "https://example.com/feed?id=1"),
            candidate("Morning edition", "https://example.com/feed?id=1"),
        ];
        let unique = dedup(raw, KeyPolicy::TitleAndUrl);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_composite_key_is_unambiguous() {
        let a = candidate("ab", "https://example.com/c");
        let b = candidate("a", "https://example.com/bc");
        assert_ne!(
            dedup_key(&a, KeyPolicy::TitleAndUrl),
            dedup_key(&b, KeyPolicy::TitleAndUrl)
        );
    }
}
