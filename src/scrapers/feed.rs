//! RSS/Atom feed polling.
//!
//! A poll fetches one feed document and turns its entries into [`Item`]s.
//! Feeds list their newest entry first; items are yielded oldest first so
//! that notifications go out in publication order.

use crate::error::{RelayError, Result};
use crate::models::Item;
use feed_rs::model::Link;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

/// A source of candidate items.
pub trait FeedSource {
    /// Fetch the current entries of the feed at `endpoint`.
    ///
    /// # Errors
    ///
    /// [`RelayError::SourceUnavailable`] when the feed cannot be fetched or
    /// parsed. The failure concerns this endpoint only.
    async fn poll(&self, endpoint: &str) -> Result<Vec<Item>>;
}

/// Polls feeds over HTTP and parses them with `feed-rs`.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl FeedSource for HttpFeedSource {
    #[instrument(level = "info", skip_all, fields(feed = %endpoint))]
    async fn poll(&self, endpoint: &str) -> Result<Vec<Item>> {
        let response = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| RelayError::source_unavailable(endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Feed answered with an error status");
            return Err(RelayError::source_unavailable(
                endpoint,
                format!("HTTP {}", status),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::source_unavailable(endpoint, e))?;

        let items = parse_feed(endpoint, &body)?;
        info!(count = items.len(), "Polled feed");
        Ok(items)
    }
}

/// Parse a feed document into items, oldest entry first.
///
/// Entries without a link cannot be identified and are skipped; a missing
/// title becomes `"Untitled"`.
pub fn parse_feed(endpoint: &str, body: &[u8]) -> Result<Vec<Item>> {
    let feed = feed_rs::parser::parse(body)
        .map_err(|e| RelayError::source_unavailable(endpoint, format!("parse error: {}", e)))?;

    let source = feed
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());

    let items = feed
        .entries
        .into_iter()
        .rev()
        .filter_map(|entry| {
            let link = article_link(&entry.links)
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty());
            let Some(link) = link else {
                debug!(entry_id = %entry.id, "Skipping entry without link");
                return None;
            };
            let title = entry
                .title
                .map(|t| t.content.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            Some(Item {
                link,
                title,
                source: source.clone(),
                published: entry.published.or(entry.updated),
            })
        })
        .collect();

    Ok(items)
}

/// The link pointing at the article itself: the first `alternate` link (an
/// absent `rel` means `alternate`), else the first link of any kind.
fn article_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
        .or_else(|| links.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, CannedServer};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example National</title>
    <link>https://news.example.com</link>
    <description>Latest</description>
    <item>
      <title>Newest story</title>
      <link>https://news.example.com/2</link>
      <pubDate>Tue, 14 Oct 2025 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Orphan story</title>
    </item>
    <item>
      <title>Older story</title>
      <link>https://news.example.com/1</link>
      <pubDate>Tue, 14 Oct 2025 08:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Example</title>
  <id>urn:example</id>
  <updated>2025-10-14T10:00:00Z</updated>
  <entry>
    <title></title>
    <id>urn:example:1</id>
    <link href="https://atom.example.com/a"/>
    <updated>2025-10-14T10:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_oldest_first() {
        let items = parse_feed("https://news.example.com/rss", RSS.as_bytes()).unwrap();
        let links: Vec<&str> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, vec!["https://news.example.com/1", "https://news.example.com/2"]);
        assert_eq!(items[0].title, "Older story");
        assert_eq!(items[0].source.as_deref(), Some("Example National"));
        assert!(items[0].published.is_some());
    }

    #[test]
    fn test_parse_atom_defaults_title() {
        let items = parse_feed("https://atom.example.com/feed", ATOM.as_bytes()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://atom.example.com/a");
        assert_eq!(items[0].title, "Untitled");
        assert_eq!(items[0].source.as_deref(), Some("Atom Example"));
    }

    #[test]
    fn test_atom_prefers_alternate_link() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Linked</title>
  <id>urn:linked</id>
  <updated>2025-10-14T10:00:00Z</updated>
  <entry>
    <title>With comments</title>
    <id>urn:linked:1</id>
    <link rel="replies" href="https://x.example/a/comments"/>
    <link rel="alternate" href="https://x.example/a"/>
    <updated>2025-10-14T10:00:00Z</updated>
  </entry>
  <entry>
    <title>Only an enclosure</title>
    <id>urn:linked:2</id>
    <link rel="enclosure" href="https://x.example/b.mp3"/>
    <updated>2025-10-14T09:00:00Z</updated>
  </entry>
</feed>"#;
        let items = parse_feed("https://x.example/feed", atom.as_bytes()).unwrap();
        let links: Vec<&str> = items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, vec!["https://x.example/b.mp3", "https://x.example/a"]);
    }

    #[test]
    fn test_parse_garbage_is_source_unavailable() {
        let err = parse_feed("https://bad.example.com", b"<html>not a feed").unwrap_err();
        match err {
            RelayError::SourceUnavailable { endpoint, .. } => {
                assert_eq!(endpoint, "https://bad.example.com")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_poll_parses_served_feed() {
        let server = CannedServer::start("200 OK", &[("Content-Type", "application/rss+xml")], RSS).await;
        let endpoint = format!("{}/rss/india.xml", server.base_url);

        let items = HttpFeedSource::new(testing::client()).poll(&endpoint).await.unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(server.requests(), ["GET /rss/india.xml HTTP/1.1"]);
    }

    #[tokio::test]
    async fn test_poll_error_status_is_source_unavailable() {
        for status in ["404 Not Found", "500 Internal Server Error"] {
            let server = CannedServer::start(status, &[], RSS).await;
            let endpoint = format!("{}/rss", server.base_url);

            let err = HttpFeedSource::new(testing::client()).poll(&endpoint).await.unwrap_err();

            match err {
                RelayError::SourceUnavailable { endpoint: e, reason } => {
                    assert_eq!(e, endpoint);
                    assert!(reason.starts_with("HTTP "), "{reason}");
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}
