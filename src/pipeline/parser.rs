use super::FetchError;
use crate::storage::{FeedId, NewsItem};
use chrono::DateTime;
use feed_rs::parser;
use url::Url;

/// Parsed candidates plus the number of entries dropped for missing a link
/// or timestamp.
pub struct ParsedCandidates {
    pub items: Vec<NewsItem>,
    pub skipped: usize,
}

/// Parse a fetched RSS/Atom document into candidate items, preserving the
/// document's entry order.
///
/// Entries without a link or a publish/update timestamp cannot participate
/// in dedup or enrichment and are skipped; a document that fails to parse
/// at all is a fetch-kind failure.
pub fn parse_candidates(
    bytes: &[u8],
    feed_id: &FeedId,
    base: Option<&Url>,
) -> Result<ParsedCandidates, FetchError> {
    let feed = parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    let mut items = Vec::with_capacity(feed.entries.len());
    let mut skipped = 0;
    for entry in feed.entries {
        let url = entry.links.first().map(|l| l.href.clone());
        let posted = entry.published.or(entry.updated);
        let (Some(url), Some(posted)) = (url, posted) else {
            skipped += 1;
            continue;
        };
        // Some feeds link entries relative to the feed's own URL.
        let url = match base {
            Some(base) => base.join(&url).map(|u| u.to_string()).unwrap_or(url),
            None => url,
        };

        // Truncate to whole seconds so both storage backends round-trip the
        // same instant.
        let posted = DateTime::from_timestamp(posted.timestamp(), 0).unwrap_or(posted);
        let title = entry
            .title
            .map(|t| t.content)
            .unwrap_or_else(|| "Untitled".to_string());
        let short_description = entry.summary.map(|s| s.content).unwrap_or_default();

        items.push(NewsItem {
            feed_id: feed_id.clone(),
            title,
            short_description,
            posted,
            url,
            full_description: None,
        });
    }

    Ok(ParsedCandidates { items, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_id() -> FeedId {
        FeedId::from(1)
    }

    fn parse(bytes: &[u8]) -> Result<ParsedCandidates, FetchError> {
        parse_candidates(bytes, &feed_id(), None)
    }

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <title>Top News</title>
    <item>
        <title>First story</title>
        <description>Short one</description>
        <link>https://example.com/first</link>
        <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
        <title>Second story</title>
        <description>Short two</description>
        <link>https://example.com/second</link>
        <pubDate>Mon, 01 Jan 2024 11:00:00 GMT</pubDate>
    </item>
</channel></rss>"#;

    #[test]
    fn test_entries_become_candidates_in_document_order() {
        let parsed = parse(RSS.as_bytes()).unwrap();
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.items.len(), 2);
        assert_eq!(parsed.items[0].title, "First story");
        assert_eq!(parsed.items[0].url, "https://example.com/first");
        assert_eq!(parsed.items[0].short_description, "Short one");
        assert_eq!(parsed.items[1].title, "Second story");
        assert!(parsed.items[0].posted < parsed.items[1].posted);
    }

    #[test]
    fn test_candidates_start_without_full_body() {
        let parsed = parse(RSS.as_bytes()).unwrap();
        assert!(parsed.items.iter().all(|i| i.full_description.is_none()));
    }

    #[test]
    fn test_entry_without_timestamp_is_skipped() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item>
        <title>Dated</title>
        <link>https://example.com/dated</link>
        <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
        <title>Undated</title>
        <link>https://example.com/undated</link>
    </item>
</channel></rss>"#;

        let parsed = parse(rss.as_bytes()).unwrap();
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.items[0].title, "Dated");
    }

    #[test]
    fn test_relative_links_resolve_against_base() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item>
        <title>Relative</title>
        <link>/article/2024/relative</link>
        <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
    </item>
</channel></rss>"#;

        let base = Url::parse("https://example.com/feeds/rss").unwrap();
        let parsed = parse_candidates(rss.as_bytes(), &feed_id(), Some(&base)).unwrap();
        assert_eq!(parsed.items[0].url, "https://example.com/article/2024/relative");
    }

    #[test]
    fn test_malformed_document_is_a_parse_error() {
        let result = parse(b"<not valid xml");
        assert!(matches!(result, Err(FetchError::Parse(_))));
    }
}
