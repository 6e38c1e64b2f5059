//! Summarizer adapter around the model client.
//!
//! Bounds what goes into the model and what comes out of it: article text is
//! cut to `max_input_chars` before it is sent, and the reply is trimmed and
//! cut to `max_summary_chars` so it always fits the outgoing message.

use crate::api::AskAsync;
use crate::error::{RelayError, Result};
use crate::models::{ExtractedContent, Summary};
use crate::utils::{smart_truncate, truncate_chars, truncate_for_log};
use tracing::{debug, info, instrument, warn};

/// Prefix telling the model what to do with the text that follows.
pub const PROMPT_PREFIX: &str = "summarize: ";

pub const DEFAULT_MAX_INPUT_CHARS: usize = 4000;
pub const DEFAULT_MAX_SUMMARY_CHARS: usize = 1000;

#[derive(Debug)]
pub struct Summarizer<A> {
    model: A,
    max_input_chars: usize,
    max_summary_chars: usize,
}

impl<A> Summarizer<A>
where
    A: AskAsync<Response = String>,
{
    pub fn new(model: A) -> Self {
        Self {
            model,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
        }
    }

    pub fn with_limits(mut self, max_input_chars: usize, max_summary_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self.max_summary_chars = max_summary_chars;
        self
    }

    /// Summarize one article.
    ///
    /// # Errors
    ///
    /// [`RelayError::SummarizationFailed`] when there is no text to summarize,
    /// the model call fails, or the model answers with nothing.
    #[instrument(level = "info", skip_all, fields(link = %content.link))]
    pub async fn summarize(&self, content: &ExtractedContent) -> Result<Summary> {
        let text = content.text.trim();
        if text.is_empty() {
            return Err(RelayError::SummarizationFailed("no text".to_string()));
        }

        let bounded = truncate_chars(text, self.max_input_chars);
        if bounded.len() < text.len() {
            debug!(
                original_chars = text.chars().count(),
                kept_chars = self.max_input_chars,
                "Truncated article text for the model"
            );
        }

        let prompt = format!("{PROMPT_PREFIX}{bounded}");
        let reply = self.model.ask(&prompt).await.map_err(|e| {
            warn!(error = %e, "Model call failed");
            RelayError::SummarizationFailed(e.to_string())
        })?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(RelayError::SummarizationFailed(
                "model returned an empty summary".to_string(),
            ));
        }

        let summary = smart_truncate(reply, self.max_summary_chars);
        info!(
            chars = summary.chars().count(),
            preview = %truncate_for_log(&summary, 80),
            "Summary complete"
        );
        Ok(Summary(summary))
    }
}
