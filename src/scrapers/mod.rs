//! Retrieval stages: feed polling and article text extraction.
//!
//! Each stage is a trait with one HTTP-backed implementation:
//!
//! | Stage | Trait | Implementation | Output |
//! |-------|-------|----------------|--------|
//! | Polling | [`feed::FeedSource`] | [`feed::HttpFeedSource`] | candidate [`Item`](crate::models::Item)s, oldest first |
//! | Extraction | [`article::Extractor`] | [`article::HtmlExtractor`] | cleaned [`ExtractedContent`](crate::models::ExtractedContent) |
//!
//! Both report failure as a typed [`RelayError`](crate::error::RelayError)
//! and never retry; a feed or article that fails now is simply tried again on
//! the next run.

pub mod article;
pub mod feed;

use reqwest::Client;
use std::time::Duration;

/// Build the HTTP client shared by every stage that talks to the web.
pub fn http_client(user_agent: &str, timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
}
