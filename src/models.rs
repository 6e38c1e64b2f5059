//! Data models passed between the relay stages.
//!
//! - [`Item`]: a candidate article discovered in a feed
//! - [`ExtractedContent`]: cleaned article text, transient
//! - [`Summary`]: bounded summary text, transient
//! - [`RunReport`]: counters describing one completed run
//!
//! Only the link of an [`Item`] outlives a run, as an entry in the seen set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A candidate article discovered in a feed.
///
/// The `link` is the article's identity: two items with the same link are
/// the same article no matter which feed surfaced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    /// The article URL, used as the dedup identifier.
    pub link: String,
    /// The headline as published in the feed.
    pub title: String,
    /// Title of the feed that surfaced the item, when the feed declares one.
    pub source: Option<String>,
    /// Publication time from the feed entry, if present.
    pub published: Option<DateTime<Utc>>,
}

impl Item {
    pub fn new(link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            title: title.into(),
            source: None,
            published: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Cleaned full text of one article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Link of the article the text was extracted from.
    pub link: String,
    pub text: String,
}

/// A bounded-length summary ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary(pub String);

impl Summary {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Counters for one run that reached the end of its enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started (UTC).
    pub started_at: DateTime<Utc>,
    /// Feeds that answered with a parseable document.
    pub feeds_polled: usize,
    /// Feeds skipped because they were unavailable.
    pub feeds_failed: usize,
    /// Items discovered across all feeds, before filtering.
    pub candidates: usize,
    /// Items that passed the seen-set filter and were processed.
    pub unseen: usize,
    /// Items delivered and marked seen.
    pub delivered: usize,
    /// Items abandoned at extraction, summarization or delivery.
    pub failed: usize,
    /// Whether the seen set is durably up to date at the end of the run.
    pub persisted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_builder() {
        let item = Item::new("https://a/1", "Headline").with_source("Example Feed");
        assert_eq!(item.link, "https://a/1");
        assert_eq!(item.title, "Headline");
        assert_eq!(item.source.as_deref(), Some("Example Feed"));
        assert!(item.published.is_none());
    }

    #[test]
    fn test_run_report_serialization() {
        let report = RunReport {
            delivered: 2,
            failed: 1,
            persisted: true,
            ..Default::default()
        };

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"delivered\":2"));
        assert!(json.contains("\"persisted\":true"));

        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
