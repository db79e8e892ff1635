//! Relational backend: one SQLite database file per partition.
//!
//! Tables mirror the logical shape of the partition: feeds, items and
//! run_records, with `items.feed_id` cascading on update/delete of the
//! parent feed. Timestamps are stored as unix seconds.

use super::{Feed, FeedId, NewsItem, RunRecord, StorageError, Store};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// Row shape shared by all item queries.
type ItemRow = (i64, String, String, i64, String, Option<String>);

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the partition's database file. The pool is the
    /// long-lived connection; tables are created by `ensure_partition`.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);
        // A `:memory:` database exists per connection, so the pool must not
        // hand out a second connection that sees an empty schema.
        let max_connections = if path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await?;
        Ok(Self { pool })
    }

    fn decode_posted(ts: i64) -> Result<DateTime<Utc>, StorageError> {
        DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| StorageError::Constraint(format!("invalid stored timestamp {ts}")))
    }

    fn feed_row_id(id: &FeedId) -> Result<i64, StorageError> {
        id.as_str()
            .parse()
            .map_err(|_| StorageError::UnknownFeedId(id.to_string()))
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn ensure_partition(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                url TEXT UNIQUE NOT NULL,
                extractor TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL
                    REFERENCES feeds(id) ON UPDATE CASCADE ON DELETE CASCADE,
                title TEXT NOT NULL,
                short_description TEXT NOT NULL,
                posted INTEGER NOT NULL,
                url TEXT NOT NULL,
                hash TEXT NOT NULL,
                full_description TEXT
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_records (
                id INTEGER PRIMARY KEY,
                run_at INTEGER NOT NULL,
                count INTEGER NOT NULL,
                by_user INTEGER NOT NULL DEFAULT 0,
                url TEXT NOT NULL,
                feed_id INTEGER REFERENCES feeds(id)
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_posted ON items(posted)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_feeds_url ON feeds(url)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn get_or_create_feed(&self, url: &str, extractor: &str) -> Result<Feed, StorageError> {
        // Single upsert instead of find-then-insert: concurrent callers with
        // the same URL land on one row. The no-op DO UPDATE makes RETURNING
        // fire on conflict; the stored extractor is never overwritten.
        let (id, extractor): (i64, String) = sqlx::query_as(
            r#"
            INSERT INTO feeds (url, extractor)
            VALUES (?, ?)
            ON CONFLICT(url) DO UPDATE SET url = excluded.url
            RETURNING id, extractor
        "#,
        )
        .bind(url)
        .bind(extractor)
        .fetch_one(&self.pool)
        .await?;

        Ok(Feed {
            id: FeedId::from(id),
            url: url.to_string(),
            extractor,
        })
    }

    async fn last_posted(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let (ts,): (Option<i64>,) = sqlx::query_as("SELECT MAX(posted) FROM items")
            .fetch_one(&self.pool)
            .await?;
        ts.map(Self::decode_posted).transpose()
    }

    async fn save_items(&self, items: &[NewsItem]) -> Result<(), StorageError> {
        if items.is_empty() {
            return Err(StorageError::EmptyBatch);
        }

        // One transaction for the batch: either every selected item lands
        // or none do.
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO items
                    (feed_id, title, short_description, posted, url, hash, full_description)
                VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            )
            .bind(Self::feed_row_id(&item.feed_id)?)
            .bind(&item.title)
            .bind(&item.short_description)
            .bind(item.posted.timestamp())
            .bind(&item.url)
            .bind(item.hash())
            .bind(&item.full_description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn save_run_record(&self, record: &RunRecord) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO run_records (run_at, count, by_user, url, feed_id)
            VALUES (?, ?, ?, ?, ?)
        "#,
        )
        .bind(record.run_at.timestamp())
        .bind(record.count)
        .bind(record.by_user)
        .bind(&record.url)
        .bind(Self::feed_row_id(&record.feed_id)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query_items(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<NewsItem>, StorageError> {
        const SELECT: &str =
            "SELECT feed_id, title, short_description, posted, url, full_description FROM items";
        const ORDER: &str = " ORDER BY posted ASC, id ASC";

        let rows: Vec<ItemRow> = match (from, to) {
            (Some(from), Some(to)) => {
                sqlx::query_as(&format!("{SELECT} WHERE posted BETWEEN ? AND ?{ORDER}"))
                    .bind(from.timestamp())
                    .bind(to.timestamp())
                    .fetch_all(&self.pool)
                    .await?
            }
            (Some(from), None) => {
                sqlx::query_as(&format!("{SELECT} WHERE posted >= ?{ORDER}"))
                    .bind(from.timestamp())
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, Some(to)) => {
                sqlx::query_as(&format!("{SELECT} WHERE posted <= ?{ORDER}"))
                    .bind(to.timestamp())
                    .fetch_all(&self.pool)
                    .await?
            }
            (None, None) => {
                sqlx::query_as(&format!("{SELECT}{ORDER}"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter()
            .map(
                |(feed_id, title, short_description, posted, url, full_description)| {
                    Ok(NewsItem {
                        feed_id: FeedId::from(feed_id),
                        title,
                        short_description,
                        posted: Self::decode_posted(posted)?,
                        url,
                        full_description,
                    })
                },
            )
            .collect()
    }
}
