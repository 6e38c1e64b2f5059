//! Durable record of links that have already been relayed.
//!
//! The seen set lives in a single plain-text blob, one link per line, read in
//! full at the start of a run and written back in full (never appended) at the
//! end of a run that delivered something.
//!
//! # Backends
//!
//! | Backend | Module | Location |
//! |---------|--------|----------|
//! | Local file | [`file`] | a path on disk, replaced atomically |
//! | Hugging Face dataset | [`hub`] | one file in a dataset repository |
//!
//! Backends implement [`BlobStore`] and only move bytes; [`SeenStore`] owns
//! the format and converts backend failures into
//! [`RelayError::StoreUnavailable`] / [`RelayError::StoreWriteFailed`].

pub mod file;
pub mod hub;

use crate::error::{RelayError, Result};
use std::collections::HashSet;
use std::error::Error;
use tracing::{debug, info, instrument, warn};

pub use file::FileBlobStore;
pub use hub::HubBlobStore;

/// A durable blob holding the serialized seen set.
pub trait BlobStore {
    /// Download the current blob. `Ok(None)` means no blob exists yet, which
    /// is the normal state before the first successful run.
    async fn download(&self) -> std::result::Result<Option<String>, Box<dyn Error>>;

    /// Replace the blob with `body`.
    async fn upload(&self, body: &str) -> std::result::Result<(), Box<dyn Error>>;
}

/// The backend chosen from configuration at start-up.
#[derive(Debug)]
pub enum AnyBlobStore {
    File(FileBlobStore),
    Hub(HubBlobStore),
}

impl BlobStore for AnyBlobStore {
    async fn download(&self) -> std::result::Result<Option<String>, Box<dyn Error>> {
        match self {
            AnyBlobStore::File(store) => store.download().await,
            AnyBlobStore::Hub(store) => store.download().await,
        }
    }

    async fn upload(&self, body: &str) -> std::result::Result<(), Box<dyn Error>> {
        match self {
            AnyBlobStore::File(store) => store.upload(body).await,
            AnyBlobStore::Hub(store) => store.upload(body).await,
        }
    }
}

/// In-memory set of relayed links for the duration of one run.
///
/// Tracks whether it has been mutated since it was loaded or last flushed so
/// an idle run never rewrites the blob.
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    links: HashSet<String>,
    dirty: bool,
}

impl SeenSet {
    /// Parse the line-delimited blob format. Lines are trimmed and blank lines
    /// are ignored.
    pub fn parse(blob: &str) -> Self {
        let links = blob
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Self { links, dirty: false }
    }

    /// Serialize to the blob format. Links are sorted so successive blobs
    /// diff cleanly; readers must not rely on the order.
    pub fn render(&self) -> String {
        let mut links: Vec<&str> = self.links.iter().map(String::as_str).collect();
        links.sort_unstable();
        let mut out = String::with_capacity(links.iter().map(|l| l.len() + 1).sum());
        for link in links {
            out.push_str(link);
            out.push('\n');
        }
        out
    }

    pub fn contains(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    /// Record `link` as relayed. Returns `true` if it was not already present;
    /// only a new link marks the set dirty.
    pub fn add(&mut self, link: &str) -> bool {
        let inserted = self.links.insert(link.to_string());
        if inserted {
            self.dirty = true;
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// Loads and persists the [`SeenSet`] through a [`BlobStore`].
#[derive(Debug)]
pub struct SeenStore<B> {
    backend: B,
}

impl<B: BlobStore> SeenStore<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    /// Load the current seen set.
    ///
    /// # Errors
    ///
    /// [`RelayError::StoreUnavailable`] when the backend cannot be read. The
    /// caller must not fall back to an empty set in that case, or every
    /// already-relayed link would be sent again.
    #[instrument(level = "info", skip_all)]
    pub async fn load(&self) -> Result<SeenSet> {
        match self.backend.download().await {
            Ok(Some(blob)) => {
                let set = SeenSet::parse(&blob);
                info!(count = set.len(), "Loaded seen links");
                Ok(set)
            }
            Ok(None) => {
                info!("No seen-links blob yet; starting with an empty set");
                Ok(SeenSet::default())
            }
            Err(e) => {
                warn!(error = %e, "Could not download seen links");
                Err(RelayError::StoreUnavailable(e.to_string()))
            }
        }
    }

    /// Write the set back if it changed. Returns `true` when a write happened.
    ///
    /// On failure the set stays dirty; the links it holds were already relayed
    /// and may be relayed again by a later run.
    #[instrument(level = "info", skip_all, fields(count = set.len()))]
    pub async fn flush(&self, set: &mut SeenSet) -> Result<bool> {
        if !set.is_dirty() {
            debug!("Seen set unchanged; skipping upload");
            return Ok(false);
        }

        let body = set.render();
        self.backend
            .upload(&body)
            .await
            .map_err(|e| RelayError::StoreWriteFailed(e.to_string()))?;
        set.dirty = false;
        info!("Seen links persisted");
        Ok(true)
    }
}
