//! Failure taxonomy for a relay run.
//!
//! Every component boundary converts its internal failures (HTTP, parsing,
//! filesystem, model errors) into one of these variants before handing
//! control back to the orchestrator. The variant decides the blast radius:
//!
//! | Variant | Scope |
//! |---------|-------|
//! | [`RelayError::StoreUnavailable`] | aborts the current run before any notification |
//! | [`RelayError::StoreWriteFailed`] | run completes, new seen links are not persisted |
//! | [`RelayError::SourceUnavailable`] | one feed contributes zero items this run |
//! | [`RelayError::ExtractionFailed`] | one item skipped, stays unseen |
//! | [`RelayError::SummarizationFailed`] | one item skipped, stays unseen |
//! | [`RelayError::DeliveryFailed`] | one item skipped, stays unseen |
//! | [`RelayError::Config`] | process start only |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The seen-state backend could not be read.
    #[error("seen-state store unavailable: {0}")]
    StoreUnavailable(String),

    /// The seen-state backend rejected the replacement blob.
    #[error("failed to write seen-state: {0}")]
    StoreWriteFailed(String),

    /// A feed endpoint could not be fetched or parsed.
    #[error("feed {endpoint} unavailable: {reason}")]
    SourceUnavailable { endpoint: String, reason: String },

    /// No usable article text could be extracted.
    #[error("extraction failed for {url}: {reason}")]
    ExtractionFailed { url: String, reason: String },

    #[error("summarization failed: {0}")]
    SummarizationFailed(String),

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    pub fn source_unavailable(endpoint: &str, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn extraction_failed(url: &str, reason: impl ToString) -> Self {
        Self::ExtractionFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
