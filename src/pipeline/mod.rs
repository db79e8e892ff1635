//! The per-run ingestion pipeline.
//!
//! One [`FeedPipeline`] instance owns one feed URL and its in-memory items
//! for the duration of a run: resolve the feed's storage identity, parse the
//! remote document, filter against the watermark, record the run, enrich the
//! survivors, and persist the batch in one storage write.

mod parser;

pub use parser::{parse_candidates, ParsedCandidates};

use crate::extract::BodyExtractor;
use crate::storage::{Feed, NewsItem, RunRecord, StorageError, Store};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Bounded fan-out for enrichment fetches; pure I/O with no shared state
/// between items.
const ENRICH_CONCURRENCY: usize = 4;

/// Errors fetching or parsing the feed document. Any of these aborts the
/// run; per-item enrichment failures never surface here.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with a non-success status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the fetch timeout
    #[error("request timed out")]
    Timeout,
    /// Document could not be parsed as RSS or Atom
    #[error("feed parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Keep candidates strictly newer than the watermark, preserving source
/// order. No watermark means a first run: everything is new.
pub fn select_new(candidates: Vec<NewsItem>, watermark: Option<DateTime<Utc>>) -> Vec<NewsItem> {
    match watermark {
        Some(w) => candidates.into_iter().filter(|c| c.posted > w).collect(),
        None => candidates,
    }
}

pub struct FeedPipeline {
    store: Arc<dyn Store>,
    client: reqwest::Client,
    feed_url: String,
    extractor_name: String,
    extractor: Arc<dyn BodyExtractor>,
    /// Storage identity, resolved once per pipeline instance.
    feed: Option<Feed>,
}

impl FeedPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        client: reqwest::Client,
        feed_url: String,
        extractor_name: String,
        extractor: Arc<dyn BodyExtractor>,
    ) -> Self {
        Self {
            store,
            client,
            feed_url,
            extractor_name,
            extractor,
            feed: None,
        }
    }

    /// Look up (or lazily create) the feed's storage identity. The result is
    /// cached for the lifetime of this pipeline instance.
    pub async fn resolve_feed(&mut self) -> Result<Feed, StorageError> {
        if let Some(feed) = &self.feed {
            return Ok(feed.clone());
        }
        let feed = self
            .store
            .get_or_create_feed(&self.feed_url, &self.extractor_name)
            .await?;
        self.feed = Some(feed.clone());
        Ok(feed)
    }

    /// Fetch and parse the remote feed document into candidate items, all
    /// without full bodies. One parse per call.
    pub async fn fetch_candidates(&self, feed: &Feed) -> Result<Vec<NewsItem>, FetchError> {
        let response = tokio::time::timeout(FETCH_TIMEOUT, self.client.get(&self.feed_url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(FetchError::Network)?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let bytes = response.bytes().await.map_err(FetchError::Network)?;
        let base = url::Url::parse(&self.feed_url).ok();
        let ParsedCandidates { items, skipped } = parse_candidates(&bytes, &feed.id, base.as_ref())?;
        if skipped > 0 {
            tracing::warn!(
                feed = %self.feed_url,
                skipped = skipped,
                "Entries without link or timestamp skipped"
            );
        }
        Ok(items)
    }

    /// Fetch each item's article page and populate its full body where the
    /// fetch succeeds. Failures leave `full_description` absent for that
    /// item only; siblings keep going and output order matches input order.
    pub async fn enrich(&self, items: Vec<NewsItem>) -> Vec<NewsItem> {
        stream::iter(items.into_iter().map(|mut item| {
            let client = self.client.clone();
            let extractor = Arc::clone(&self.extractor);
            async move {
                match fetch_article(&client, &item.url).await {
                    Ok(html) => {
                        item.full_description = Some(extractor.extract(&html));
                    }
                    Err(e) => {
                        tracing::warn!(
                            url = %item.url,
                            error = %e,
                            "Enrichment failed, persisting item without full body"
                        );
                    }
                }
                item
            }
        }))
        .buffered(ENRICH_CONCURRENCY)
        .collect()
        .await
    }

    /// One end-to-end run. Returns the number of items persisted.
    pub async fn run(&mut self, by_user: bool) -> Result<usize, RunError> {
        // Partition creation is always explicit and always first; neither
        // backend creates anything implicitly elsewhere.
        self.store.ensure_partition().await?;

        let feed = self.resolve_feed().await?;
        let candidates = self.fetch_candidates(&feed).await?;
        let watermark = self.store.last_posted().await?;
        let fresh = select_new(candidates, watermark);

        tracing::info!(
            feed = %self.feed_url,
            selected = fresh.len(),
            watermark = ?watermark,
            by_user = by_user,
            "Run selection complete"
        );

        // Audit count is captured before enrichment and persistence: it
        // records items selected as new, not items that made it to storage.
        // If the batch write below fails the count overstates reality.
        let record = RunRecord {
            run_at: Utc::now(),
            count: fresh.len() as i64,
            by_user,
            url: self.feed_url.clone(),
            feed_id: feed.id.clone(),
        };
        self.store.save_run_record(&record).await?;

        if fresh.is_empty() {
            return Ok(0);
        }

        let enriched = self.enrich(fresh).await;
        self.store.save_items(&enriched).await?;
        tracing::info!(feed = %self.feed_url, persisted = enriched.len(), "Run persisted");
        Ok(enriched.len())
    }
}

async fn fetch_article(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    // Enrichment requires a plain 200; anything else leaves the body absent.
    if response.status() != reqwest::StatusCode::OK {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    response.text().await.map_err(FetchError::Network)
}
