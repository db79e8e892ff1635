use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque feed identifier assigned by the storage backend on first sight.
///
/// The relational backend renders its integer row id as a string, the
/// document backend uses a uuid. Keeping the id opaque at this boundary is
/// what lets the pipeline and exporter be written once against [`super::Store`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedId(String);

impl FeedId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FeedId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<i64> for FeedId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// A syndication source tracked across runs. Never mutated or deleted by the
/// pipeline once created.
#[derive(Debug, Clone)]
pub struct Feed {
    pub id: FeedId,
    pub url: String,
    /// Name of the body-extraction strategy applied to this feed's items.
    pub extractor: String,
}

/// One syndicated entry, in memory for the duration of a run.
#[derive(Debug, Clone)]
pub struct NewsItem {
    pub feed_id: FeedId,
    pub title: String,
    pub short_description: String,
    /// Feed-supplied publish instant, normalized to UTC at second precision.
    pub posted: DateTime<Utc>,
    pub url: String,
    /// None until enrichment succeeds for this item.
    pub full_description: Option<String>,
}

impl NewsItem {
    /// Derived content fingerprint; never stored redundantly in memory.
    pub fn hash(&self) -> String {
        crate::fingerprint::url_hash(&self.url)
    }
}

/// Audit entry for one pipeline invocation.
///
/// `count` is captured at filter time and reflects items selected as new,
/// not items successfully persisted.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_at: DateTime<Utc>,
    pub count: i64,
    pub by_user: bool,
    pub url: String,
    pub feed_id: FeedId,
}
