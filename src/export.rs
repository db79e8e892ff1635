//! CSV export of stored items.
//!
//! A read-only consumer of the storage backend: pulls a time-bounded slice
//! of items and writes them in result order with a fixed header. The
//! destination is always overwritten; there are no resume or append
//! semantics.

use crate::storage::{StorageError, Store};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column header, matching the item attribute names.
pub const CSV_HEADER: [&str; 6] = [
    "title",
    "short_description",
    "posted",
    "url",
    "hash",
    "full_description",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("csv write error: {0}")]
    Csv(#[from] csv::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Export items with `posted` inside the inclusive `[from, to]` range to a
/// UTF-8 comma-separated file, quoting on demand. Returns the path written.
///
/// Without an explicit destination the file lands in the working directory
/// under a timestamped name.
pub async fn export_csv(
    store: &dyn Store,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    destination: Option<&Path>,
) -> Result<PathBuf, ExportError> {
    let items = store.query_items(from, to).await?;

    let path = destination.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(format!("output_news_{}.csv", Utc::now().timestamp()))
    });

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(CSV_HEADER)?;
    for item in &items {
        let posted = item.posted.to_rfc3339();
        let hash = item.hash();
        writer.write_record([
            item.title.as_str(),
            item.short_description.as_str(),
            posted.as_str(),
            item.url.as_str(),
            hash.as_str(),
            item.full_description.as_deref().unwrap_or(""),
        ])?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), rows = items.len(), "Exported items");
    Ok(path)
}
