//! Storage abstraction over two structurally different backends.
//!
//! Both backends present the identical behavioral contract defined by
//! [`Store`]: the pipeline and exporter are written once against the trait
//! and must observe the same results regardless of which backend holds the
//! data. Backend selection happens at startup from configuration.

mod document;
mod sqlite;
mod types;

pub use document::DocumentStore;
pub use sqlite::SqliteStore;
pub use types::{Feed, FeedId, NewsItem, RunRecord};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Connection or query failure in the relational backend.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Filesystem failure in the document backend.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// A document collection could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A stored value violates the schema's expectations.
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// `save_items` was called with an empty batch.
    #[error("save_items requires a non-empty batch")]
    EmptyBatch,
    /// A feed id did not originate from this backend.
    #[error("unknown feed id: {0}")]
    UnknownFeedId(String),
}

/// Persistence contract shared by the relational and document backends.
///
/// Connections are long-lived and established lazily; callers serialize runs
/// per feed themselves. `ensure_partition` is the only operation with a
/// creation side effect and must tolerate concurrent "already exists" races.
#[async_trait]
pub trait Store: Send + Sync {
    /// Idempotently create the logical partition and its three collections
    /// (feeds, items, run records). A second call is a no-op, not an error.
    async fn ensure_partition(&self) -> Result<(), StorageError>;

    /// Atomic lookup-or-create by feed URL. Concurrent calls with the same
    /// URL must resolve to one feed row.
    async fn get_or_create_feed(&self, url: &str, extractor: &str) -> Result<Feed, StorageError>;

    /// Partition-scoped watermark: `max(posted)` over all stored items, or
    /// `None` when no items exist yet.
    async fn last_posted(&self) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Bulk insert of a non-empty batch, all-or-nothing.
    async fn save_items(&self, items: &[NewsItem]) -> Result<(), StorageError>;

    async fn save_run_record(&self, record: &RunRecord) -> Result<(), StorageError>;

    /// Items with `posted` inside the inclusive `[from, to]` range; an absent
    /// bound leaves that side open. Results are ordered by `posted` ascending
    /// with insertion order as the tiebreak.
    async fn query_items(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<NewsItem>, StorageError>;
}
