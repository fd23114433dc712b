use url::Url;

/// Sentinel emitted for a record whose publication date could not be
/// recovered from either the listing or the detail page.
pub const DATE_UNKNOWN: &str = "unknown";

/// A finished article record as handed to the sink.
///
/// Invariants: `title` is non-empty and `url` is absolute (both enforced
/// at extraction time; candidates violating them are dropped). `date` is
/// `None` until the listing or the enricher recovers it, and serializes
/// as [`DATE_UNKNOWN`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Record {
    pub title: String,
    pub url: Url,
    #[serde(serialize_with = "serialize_date")]
    pub date: Option<String>,
    /// True only when the date was recovered from the item's own page.
    pub enriched: bool,
}

fn serialize_date<S>(date: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(date.as_deref().unwrap_or(DATE_UNKNOWN))
}

/// A listing item as extracted, before dedup and truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCandidate {
    pub title: String,
    pub url: Url,
    /// Date found inline on the listing page, if any.
    pub date: Option<String>,
}

impl RawCandidate {
    /// Promote a surviving candidate to a record. `enriched` starts false;
    /// only the enricher sets it.
    pub fn into_record(self) -> Record {
        Record {
            title: self.title,
            url: self.url,
            date: self.date,
            enriched: false,
        }
    }
}
