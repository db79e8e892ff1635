//! Document backend: three JSON collections under a partition directory.
//!
//! Documents carry string ids (uuid v4) and reference their parent feed by
//! the id's string form, mirroring a document database rather than foreign
//! keys. Every collection write goes through write-temp-then-rename so a
//! crashed write never leaves a half-serialized collection behind.

use super::{Feed, FeedId, NewsItem, RunRecord, StorageError, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use uuid::Uuid;

const FEEDS: &str = "feeds";
const ITEMS: &str = "items";
const RUN_RECORDS: &str = "run_records";

#[derive(Debug, Serialize, Deserialize)]
struct FeedDoc {
    id: String,
    url: String,
    extractor: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ItemDoc {
    id: String,
    feed_id: String,
    title: String,
    short_description: String,
    posted: DateTime<Utc>,
    url: String,
    hash: String,
    full_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunRecordDoc {
    id: String,
    run_at: DateTime<Utc>,
    count: i64,
    by_user: bool,
    url: String,
    feed_id: String,
}

pub struct DocumentStore {
    root: PathBuf,
    // Serializes read-modify-write cycles so lookup-or-create cannot race
    // within one process.
    write_lock: Mutex<()>,
}

impl DocumentStore {
    /// `root` is the partition directory; nothing is touched until
    /// `ensure_partition` or the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    async fn read_collection<T: DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<Vec<T>, StorageError> {
        match tokio::fs::read(self.collection_path(name)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn write_collection<T: Serialize>(
        &self,
        name: &str,
        docs: &[T],
    ) -> Result<(), StorageError> {
        let path = self.collection_path(name);
        let body = serde_json::to_vec_pretty(docs)?;
        write_atomic(&path, &body).await?;
        Ok(())
    }
}

/// Write-to-temp-then-rename; rename is atomic on the same filesystem.
async fn write_atomic(path: &Path, body: &[u8]) -> Result<(), std::io::Error> {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let tmp = path.with_extension(format!("tmp.{suffix:016x}"));
    tokio::fs::write(&tmp, body).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl Store for DocumentStore {
    async fn ensure_partition(&self) -> Result<(), StorageError> {
        // create_dir_all and create_new both tolerate losing a race to a
        // concurrent creator.
        tokio::fs::create_dir_all(&self.root).await?;
        for name in [FEEDS, ITEMS, RUN_RECORDS] {
            let path = self.collection_path(name);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    use tokio::io::AsyncWriteExt;
                    file.write_all(b"[]").await?;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(StorageError::Io(e)),
            }
        }
        Ok(())
    }

    async fn get_or_create_feed(&self, url: &str, extractor: &str) -> Result<Feed, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut feeds: Vec<FeedDoc> = self.read_collection(FEEDS).await?;

        if let Some(doc) = feeds.iter().find(|f| f.url == url) {
            return Ok(Feed {
                id: FeedId::from(doc.id.clone()),
                url: doc.url.clone(),
                extractor: doc.extractor.clone(),
            });
        }

        let doc = FeedDoc {
            id: Uuid::new_v4().to_string(),
            url: url.to_string(),
            extractor: extractor.to_string(),
        };
        let feed = Feed {
            id: FeedId::from(doc.id.clone()),
            url: doc.url.clone(),
            extractor: doc.extractor.clone(),
        };
        feeds.push(doc);
        self.write_collection(FEEDS, &feeds).await?;
        Ok(feed)
    }

    async fn last_posted(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let items: Vec<ItemDoc> = self.read_collection(ITEMS).await?;
        Ok(items.iter().map(|i| i.posted).max())
    }

    async fn save_items(&self, items: &[NewsItem]) -> Result<(), StorageError> {
        if items.is_empty() {
            return Err(StorageError::EmptyBatch);
        }

        let _guard = self.write_lock.lock().await;
        let mut docs: Vec<ItemDoc> = self.read_collection(ITEMS).await?;
        docs.extend(items.iter().map(|item| ItemDoc {
            id: Uuid::new_v4().to_string(),
            feed_id: item.feed_id.to_string(),
            title: item.title.clone(),
            short_description: item.short_description.clone(),
            posted: item.posted,
            url: item.url.clone(),
            hash: item.hash(),
            full_description: item.full_description.clone(),
        }));
        // The whole batch lands in one atomic collection write.
        self.write_collection(ITEMS, &docs).await
    }

    async fn save_run_record(&self, record: &RunRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut docs: Vec<RunRecordDoc> = self.read_collection(RUN_RECORDS).await?;
        docs.push(RunRecordDoc {
            id: Uuid::new_v4().to_string(),
            run_at: record.run_at,
            count: record.count,
            by_user: record.by_user,
            url: record.url.clone(),
            feed_id: record.feed_id.to_string(),
        });
        self.write_collection(RUN_RECORDS, &docs).await
    }

    async fn query_items(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<NewsItem>, StorageError> {
        let docs: Vec<ItemDoc> = self.read_collection(ITEMS).await?;

        let mut matched: Vec<ItemDoc> = docs
            .into_iter()
            .filter(|doc| from.map_or(true, |f| doc.posted >= f))
            .filter(|doc| to.map_or(true, |t| doc.posted <= t))
            .collect();
        // Stable sort keeps insertion order as the tiebreak, matching the
        // relational backend's ORDER BY posted, id.
        matched.sort_by_key(|doc| doc.posted);

        Ok(matched
            .into_iter()
            .map(|doc| NewsItem {
                feed_id: FeedId::from(doc.feed_id),
                title: doc.title,
                short_description: doc.short_description,
                posted: doc.posted,
                url: doc.url,
                full_description: doc.full_description,
            })
            .collect())
    }
}
