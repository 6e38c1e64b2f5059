//! One relay run: load seen links, poll feeds, relay what is new, persist.
//!
//! ```text
//! LoadSeen ──StoreUnavailable──▶ RunAborted
//!    │
//!    ▼
//! Enumerate (feeds in configured order, unavailable feeds skipped)
//!    │
//!    ▼
//! Filter (drop seen links, first occurrence of a link wins)
//!    │
//!    ▼
//! ProcessItem × N: extract ─▶ summarize ─▶ notify ─▶ mark seen
//!    │              (any failure abandons that item only)
//!    ▼
//! Persist (only if something was marked) ─▶ RunSucceeded
//! ```
//!
//! A link is marked seen only after its notification was delivered. An item
//! that fails anywhere before that stays unseen and is tried again next run.

use crate::api::AskAsync;
use crate::error::Result;
use crate::models::{Item, RunReport};
use crate::notify::{Notifier, Transport};
use crate::scrapers::article::Extractor;
use crate::scrapers::feed::FeedSource;
use crate::store::{BlobStore, SeenSet, SeenStore};
use crate::summarize::Summarizer;
use chrono::Utc;
use itertools::Itertools;
use std::collections::HashMap;
use tracing::{debug, error, info, instrument, warn};

/// Keep the items whose link is not in `seen`, in discovery order, each link
/// at most once. `batches` holds one entry per feed in configured order.
///
/// With `max_per_feed`, a feed contributes at most that many items; the rest
/// wait for a later run.
pub fn select_unseen(batches: Vec<Vec<Item>>, seen: &SeenSet, max_per_feed: Option<usize>) -> Vec<Item> {
    let mut taken: HashMap<usize, usize> = HashMap::new();

    batches
        .into_iter()
        .enumerate()
        .flat_map(|(feed, items)| items.into_iter().map(move |item| (feed, item)))
        .filter(|(_, item)| !seen.contains(&item.link))
        .unique_by(|(_, item)| item.link.clone())
        .filter(|(feed, _)| match max_per_feed {
            None => true,
            Some(cap) => {
                let n = taken.entry(*feed).or_default();
                if *n < cap {
                    *n += 1;
                    true
                } else {
                    false
                }
            }
        })
        .map(|(_, item)| item)
        .collect()
}

/// The relay orchestrator. Owns every collaborator for the lifetime of the
/// process; each [`Pipeline::run`] owns the seen set it loads.
#[derive(Debug)]
pub struct Pipeline<B, F, X, A, T> {
    store: SeenStore<B>,
    feeds: F,
    extractor: X,
    summarizer: Summarizer<A>,
    notifier: Notifier<T>,
    endpoints: Vec<String>,
    max_items_per_feed: Option<usize>,
}

impl<B, F, X, A, T> Pipeline<B, F, X, A, T>
where
    B: BlobStore,
    F: FeedSource,
    X: Extractor,
    A: AskAsync<Response = String>,
    T: Transport,
{
    pub fn new(
        store: SeenStore<B>,
        feeds: F,
        extractor: X,
        summarizer: Summarizer<A>,
        notifier: Notifier<T>,
        endpoints: Vec<String>,
    ) -> Self {
        Self {
            store,
            feeds,
            extractor,
            summarizer,
            notifier,
            endpoints,
            max_items_per_feed: None,
        }
    }

    pub fn with_max_items_per_feed(mut self, max: Option<usize>) -> Self {
        self.max_items_per_feed = max;
        self
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &SeenStore<B> {
        &self.store
    }

    /// Execute one run.
    ///
    /// Returns the run report once enumeration has completed, however many
    /// feeds or items failed along the way. A failed flush is reported as
    /// `persisted: false`, not as an error.
    ///
    /// # Errors
    ///
    /// [`RelayError::StoreUnavailable`](crate::error::RelayError::StoreUnavailable)
    /// if the seen set cannot be loaded. Nothing is polled or sent in that case.
    #[instrument(level = "info", skip_all, fields(feeds = self.endpoints.len()))]
    pub async fn run(&self) -> Result<RunReport> {
        let mut report = RunReport {
            started_at: Utc::now(),
            ..Default::default()
        };

        let mut seen = self.store.load().await?;
        let seen_before = seen.len();

        let mut batches = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            match self.feeds.poll(endpoint).await {
                Ok(items) => {
                    report.feeds_polled += 1;
                    report.candidates += items.len();
                    batches.push(items);
                }
                Err(e) => {
                    report.feeds_failed += 1;
                    warn!(feed = %endpoint, error = %e, "Skipping unavailable feed");
                }
            }
        }

        let unseen = select_unseen(batches, &seen, self.max_items_per_feed);
        report.unseen = unseen.len();
        info!(
            candidates = report.candidates,
            unseen = report.unseen,
            "Filtered candidates against seen links"
        );

        for item in &unseen {
            info!(
                link = %item.link,
                title = %item.title,
                published = ?item.published,
                "New article found"
            );
            match self.process(item).await {
                Ok(()) => {
                    seen.add(&item.link);
                    report.delivered += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(link = %item.link, error = %e, "Skipping article; will retry next run");
                }
            }
        }

        debug_assert!(seen.len() >= seen_before);

        report.persisted = match self.store.flush(&mut seen).await {
            Ok(wrote) => {
                if !wrote {
                    debug!("No new articles this run");
                }
                true
            }
            Err(e) => {
                error!(
                    error = %e,
                    pending = report.delivered,
                    "Seen links not persisted; delivered articles may be sent again"
                );
                false
            }
        };

        info!(
            delivered = report.delivered,
            failed = report.failed,
            feeds_failed = report.feeds_failed,
            persisted = report.persisted,
            "Run complete"
        );
        Ok(report)
    }

    /// extract → summarize → notify for one item. The caller marks the link
    /// seen only when this returns `Ok`.
    async fn process(&self, item: &Item) -> Result<()> {
        let content = self.extractor.extract(&item.link).await?;
        let summary = self.summarizer.summarize(&content).await?;
        self.notifier.notify(item, &summary).await
    }
}
