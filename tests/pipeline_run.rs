//! End-to-end pipeline tests against a mock HTTP server.
//!
//! These exercise the full run: feed fetch, watermark filtering, concurrent
//! enrichment, run-record audit, batch persistence, and CSV export.

use chrono::{DateTime, TimeZone, Utc};
use newsink::export::{export_csv, CSV_HEADER};
use newsink::extract;
use newsink::pipeline::{FeedPipeline, FetchError, RunError};
use newsink::storage::{DocumentStore, NewsItem, SqliteStore, Store};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
}

/// RSS document with one item per (slug, pubDate) pair, links resolving to
/// the mock server.
fn rss(server_uri: &str, entries: &[(&str, &str)]) -> String {
    let items: String = entries
        .iter()
        .map(|(slug, date)| {
            format!(
                r#"<item>
                    <title>Story {slug}</title>
                    <description>Summary {slug}</description>
                    <link>{server_uri}/articles/{slug}</link>
                    <pubDate>{date}</pubDate>
                </item>"#
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test</title>{items}</channel></rss>"#
    )
}

fn article_html(text: &str) -> String {
    format!(
        r#"<html><body>
            <h1 class="ArticleHeader_headline">Headline</h1>
            <div class="StandardArticleBody_body"><p>{text}</p></div>
        </body></html>"#
    )
}

fn pipeline(store: Arc<dyn Store>, feed_url: String) -> FeedPipeline {
    FeedPipeline::new(
        store,
        reqwest::Client::new(),
        feed_url,
        "reuters".to_string(),
        extract::resolve("reuters").unwrap(),
    )
}

const T1: &str = "Mon, 01 Jan 2024 10:00:00 GMT";
const T2: &str = "Mon, 01 Jan 2024 11:00:00 GMT";
const T3: &str = "Mon, 01 Jan 2024 12:00:00 GMT";

#[tokio::test]
async fn test_watermark_run_persists_only_newer_items() {
    let server = MockServer::start().await;
    let feed_url = format!("{}/feed", server.uri());

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string(rss(
            &server.uri(),
            &[("one", T1), ("two", T2), ("three", T3)],
        )))
        .mount(&server)
        .await;
    for slug in ["two", "three"] {
        Mock::given(method("GET"))
            .and(path(format!("/articles/{slug}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(article_html(&format!("Body {slug}"))),
            )
            .mount(&server)
            .await;
    }

    // Document backend so the audit collection can be inspected on disk.
    let scratch = TempDir::new().unwrap();
    let root = scratch.path().join("partition");
    let store: Arc<dyn Store> = Arc::new(DocumentStore::new(root.clone()));

    // Seed the item at T1 so the watermark sits there.
    store.ensure_partition().await.unwrap();
    let feed = store.get_or_create_feed(&feed_url, "reuters").await.unwrap();
    store
        .save_items(&[NewsItem {
            feed_id: feed.id.clone(),
            title: "Story one".to_string(),
            short_description: "Summary one".to_string(),
            posted: at(10),
            url: format!("{}/articles/one", server.uri()),
            full_description: None,
        }])
        .await
        .unwrap();

    let persisted = pipeline(Arc::clone(&store), feed_url).run(false).await.unwrap();
    assert_eq!(persisted, 2);

    let items = store.query_items(None, None).await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].posted, at(10));
    // The two fresh items were enriched; the pre-existing one is untouched.
    assert!(items[0].full_description.is_none());
    assert!(items[1].full_description.as_deref().unwrap().contains("Body two"));
    assert!(items[2].full_description.as_deref().unwrap().contains("Body three"));

    // Exactly one audit record, with the pre-enrichment selection count.
    let audit = std::fs::read_to_string(root.join("run_records.json")).unwrap();
    let records: serde_json::Value = serde_json::from_str(&audit).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["count"], 2);
    assert_eq!(records[0]["by_user"], false);
    assert_eq!(records[0]["feed_id"], serde_json::json!(feed.id.as_str()));
}

#[tokio::test]
async fn test_first_run_selects_all_candidates() {
    let server = MockServer::start().await;
    let feed_url = format!("{}/feed", server.uri());

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&server.uri(), &[("one", T1), ("two", T2)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_html("Body")))
        .mount(&server)
        .await;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(":memory:").await.unwrap());
    let persisted = pipeline(Arc::clone(&store), feed_url).run(true).await.unwrap();
    assert_eq!(persisted, 2);
    assert_eq!(store.query_items(None, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_enrichment_404_is_soft_per_item() {
    let server = MockServer::start().await;
    let feed_url = format!("{}/feed", server.uri());

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&server.uri(), &[("ok", T1), ("gone", T2)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/articles/ok"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_html("Full body")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/articles/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(":memory:").await.unwrap());
    let persisted = pipeline(Arc::clone(&store), feed_url).run(false).await.unwrap();

    // The failed enrichment never shrinks the batch.
    assert_eq!(persisted, 2);
    let items = store.query_items(None, None).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(items[0].full_description.as_deref().unwrap().contains("Full body"));
    assert_eq!(items[1].full_description, None);
}

#[tokio::test]
async fn test_unreachable_feed_aborts_run() {
    let server = MockServer::start().await;
    let feed_url = format!("{}/feed", server.uri());

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(":memory:").await.unwrap());
    let err = pipeline(Arc::clone(&store), feed_url).run(false).await.unwrap_err();
    assert!(matches!(
        err,
        RunError::Fetch(FetchError::HttpStatus(500))
    ));
    assert!(store.query_items(None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_feed_aborts_run() {
    let server = MockServer::start().await;
    let feed_url = format!("{}/feed", server.uri());

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<not a feed"))
        .mount(&server)
        .await;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(":memory:").await.unwrap());
    let err = pipeline(Arc::clone(&store), feed_url).run(false).await.unwrap_err();
    assert!(matches!(err, RunError::Fetch(FetchError::Parse(_))));
}

#[tokio::test]
async fn test_run_with_nothing_new_writes_audit_only() {
    let server = MockServer::start().await;
    let feed_url = format!("{}/feed", server.uri());

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(rss(&server.uri(), &[("one", T1)])),
        )
        .mount(&server)
        .await;

    let scratch = TempDir::new().unwrap();
    let root = scratch.path().join("partition");
    let store: Arc<dyn Store> = Arc::new(DocumentStore::new(root.clone()));
    store.ensure_partition().await.unwrap();
    let feed = store.get_or_create_feed(&feed_url, "reuters").await.unwrap();
    store
        .save_items(&[NewsItem {
            feed_id: feed.id.clone(),
            title: "Story one".to_string(),
            short_description: String::new(),
            posted: at(10),
            url: format!("{}/articles/one", server.uri()),
            full_description: None,
        }])
        .await
        .unwrap();

    let persisted = pipeline(Arc::clone(&store), feed_url).run(false).await.unwrap();
    assert_eq!(persisted, 0);
    assert_eq!(store.query_items(None, None).await.unwrap().len(), 1);

    let audit = std::fs::read_to_string(root.join("run_records.json")).unwrap();
    let records: serde_json::Value = serde_json::from_str(&audit).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["count"], 0);
}

#[tokio::test]
async fn test_export_round_trip() {
    let server = MockServer::start().await;
    let feed_url = format!("{}/feed", server.uri());

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(rss(&server.uri(), &[("one", T1), ("two", T2)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(article_html("Exported body")))
        .mount(&server)
        .await;

    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(":memory:").await.unwrap());
    pipeline(Arc::clone(&store), feed_url).run(false).await.unwrap();

    let scratch = TempDir::new().unwrap();
    let dest = scratch.path().join("export.csv");
    let written = export_csv(store.as_ref(), None, None, Some(&dest)).await.unwrap();
    assert_eq!(written, dest);

    let mut reader = csv::Reader::from_path(&dest).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        CSV_HEADER.to_vec()
    );
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], *"Story one");
    assert!(rows[0][5].contains("Exported body"));
    // hash column is the 40-char SHA-1 of the url column
    assert_eq!(rows[0][4].len(), 40);

    // A bound past every stored item exports only the header.
    let empty_dest = scratch.path().join("empty.csv");
    export_csv(store.as_ref(), Some(at(13)), None, Some(&empty_dest))
        .await
        .unwrap();
    let mut reader = csv::Reader::from_path(&empty_dest).unwrap();
    assert_eq!(reader.records().count(), 0);
}
