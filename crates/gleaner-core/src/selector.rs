//! Selector chain resolution against parsed documents.
//!
//! `scraper::Html` is not `Send`, so every function here is synchronous
//! and parses/drops documents inside one scope. Callers must not hold a
//! document across an await point.

use chrono::NaiveDate;
use scraper::ElementRef;

use crate::rules::{FieldRule, SelectorChain, ValueSource};

impl SelectorChain {
    /// First element matched by the earliest-listed selector that matches
    /// anything under `scope`. Chain order wins over document order: a
    /// later selector's match is ignored even if it appears earlier in
    /// the document.
    pub fn first_match<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.selectors()
            .iter()
            .find_map(|sel| scope.select(sel).next())
    }

    /// All elements matched by the first selector in the chain that
    /// matches at all, in document order. Used for item containers.
    pub fn all_matches<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        for sel in self.selectors() {
            let hits: Vec<_> = scope.select(sel).collect();
            if !hits.is_empty() {
                return hits;
            }
        }
        Vec::new()
    }
}

impl FieldRule {
    /// Resolve this field under `scope`, applying the configured source,
    /// pattern, and normalization. `None` means the field is absent;
    /// never an error.
    pub fn resolve(&self, scope: ElementRef<'_>) -> Option<String> {
        let element = self.chain.first_match(scope)?;
        let mut value = match &self.source {
            ValueSource::Text => squeeze_whitespace(&element.text().collect::<Vec<_>>().join(" ")),
            ValueSource::Attr(name) => element.value().attr(name)?.trim().to_string(),
        };

        if let Some(pattern) = &self.pattern {
            let caps = pattern.captures(&value)?;
            value = caps
                .get(1)
                .or_else(|| caps.get(0))?
                .as_str()
                .trim()
                .to_string();
        }

        if self.normalize_date {
            value = normalize_date(&value);
        }

        if value.is_empty() { None } else { Some(value) }
    }
}

fn squeeze_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Best-effort date normalization to `%Y-%m-%d`.
///
/// Tries RFC 3339/2822 and the date formats seen across the sources this
/// pipeline replaces. A value that parses as none of them is returned
/// unchanged; a raw date string still beats the sentinel.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(trimmed) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }

    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d.%m.%Y",
        "%d/%m/%Y",
        "%B %d, %Y",
        "%b %d, %Y",
        "%d %B %Y",
        "%d %b %Y",
    ];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.format("%Y-%m-%d").to_string();
        }
    }

    // Datetime without offset, e.g. "2025-05-06T14:30:00".
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return dt.date().format("%Y-%m-%d").to_string();
    }

    trimmed.to_string()
}
