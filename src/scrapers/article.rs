//! Article text extraction.
//!
//! Downloads an article page and keeps the text of its paragraphs, preferring
//! paragraphs inside `<article>` and falling back to every `<p>` on the page.
//! Very short paragraphs (bylines, share prompts, breadcrumbs) are dropped.

use crate::error::{RelayError, Result};
use crate::models::ExtractedContent;
use crate::utils::collapse_whitespace;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};

/// Paragraphs shorter than this many characters are treated as page chrome.
pub const DEFAULT_MIN_PARAGRAPH_CHARS: usize = 40;

/// Turns an article URL into cleaned text.
pub trait Extractor {
    /// # Errors
    ///
    /// [`RelayError::ExtractionFailed`] when the page cannot be fetched or
    /// holds no usable text.
    async fn extract(&self, url: &str) -> Result<ExtractedContent>;
}

#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    client: Client,
    min_paragraph_chars: usize,
}

impl HtmlExtractor {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            min_paragraph_chars: DEFAULT_MIN_PARAGRAPH_CHARS,
        }
    }

    pub fn with_min_paragraph_chars(mut self, min: usize) -> Self {
        self.min_paragraph_chars = min;
        self
    }
}

impl Extractor for HtmlExtractor {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn extract(&self, url: &str) -> Result<ExtractedContent> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelayError::extraction_failed(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "Article answered with an error status");
            return Err(RelayError::extraction_failed(url, format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RelayError::extraction_failed(url, e))?;

        let text = extract_text(&body, self.min_paragraph_chars)
            .map_err(|e| RelayError::extraction_failed(url, e))?
            .ok_or_else(|| RelayError::extraction_failed(url, "no article text"))?;

        info!(chars = text.chars().count(), "Extracted article text");
        Ok(ExtractedContent {
            link: url.to_string(),
            text,
        })
    }
}

/// Pull paragraph text out of an HTML document.
///
/// Returns `Ok(None)` when no paragraph survives the length filter.
pub fn extract_text(html: &str, min_paragraph_chars: usize) -> std::result::Result<Option<String>, String> {
    let document = Html::parse_document(html);
    let article_selector = Selector::parse("article p").map_err(|e| e.to_string())?;
    let any_selector = Selector::parse("p").map_err(|e| e.to_string())?;

    let keep = |element: scraper::ElementRef<'_>| {
        let text = collapse_whitespace(&element.text().collect::<String>());
        (text.chars().count() >= min_paragraph_chars).then_some(text)
    };

    let mut paragraphs: Vec<String> = document.select(&article_selector).filter_map(keep).collect();
    if paragraphs.is_empty() {
        debug!("No paragraphs inside <article>; falling back to the whole page");
        paragraphs = document.select(&any_selector).filter_map(keep).collect();
    }

    if paragraphs.is_empty() {
        Ok(None)
    } else {
        Ok(Some(paragraphs.join("\n\n")))
    }
}
