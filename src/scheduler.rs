//! Scheduler loop: run, publish status, wait, repeat.
//!
//! A run that returns an error or panics is logged and published as
//! [`RunStatus::Aborted`]; the loop still waits the full interval before the
//! next attempt. The wait is the only point where shutdown is observed, so a
//! run in progress always finishes.

use crate::api::AskAsync;
use crate::notify::Transport;
use crate::pipeline::Pipeline;
use crate::scrapers::article::Extractor;
use crate::scrapers::feed::FeedSource;
use crate::status::RunStatus;
use crate::store::BlobStore;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, instrument};

/// Default wait between runs.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1800);

#[derive(Debug)]
pub struct Scheduler<B, F, X, A, T> {
    pipeline: Pipeline<B, F, X, A, T>,
    interval: Duration,
    status: watch::Sender<RunStatus>,
}

impl<B, F, X, A, T> Scheduler<B, F, X, A, T>
where
    B: BlobStore,
    F: FeedSource,
    X: Extractor,
    A: AskAsync<Response = String>,
    T: Transport,
{
    pub fn new(
        pipeline: Pipeline<B, F, X, A, T>,
        interval: Duration,
        status: watch::Sender<RunStatus>,
    ) -> Self {
        Self {
            pipeline,
            interval,
            status,
        }
    }

    /// Execute one run and publish its outcome.
    #[instrument(level = "info", skip_all)]
    pub async fn run_once(&self) -> RunStatus {
        let outcome = AssertUnwindSafe(self.pipeline.run()).catch_unwind().await;

        let status = match outcome {
            Ok(Ok(report)) => RunStatus::Succeeded { report },
            Ok(Err(e)) => {
                error!(error = %e, "Run aborted");
                RunStatus::aborted(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(panic = %reason, "Run panicked");
                RunStatus::aborted(format!("panic: {reason}"))
            }
        };

        self.status.send_replace(status.clone());
        status
    }

    /// Run forever, waiting `interval` between runs, until `shutdown` resolves
    /// during a wait.
    pub async fn run_until<S>(&self, shutdown: S)
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            interval_secs = self.interval.as_secs(),
            feeds = self.pipeline.endpoints().len(),
            "Scheduler started"
        );

        loop {
            self.run_once().await;

            tokio::select! {
                _ = sleep(self.interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown requested; stopping scheduler");
                    break;
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::Item;
    use crate::notify::Notifier;
    use crate::notify::tests::RecordingTransport;
    use crate::pipeline::tests::{FakeExtractor, FakeFeeds};
    use crate::status;
    use crate::store::SeenStore;
    use crate::store::tests::MemoryBlobStore;
    use crate::summarize::Summarizer;
    use crate::summarize::tests::CannedModel;

    fn pipeline<F: FeedSource>(
        store: MemoryBlobStore,
        feeds: F,
    ) -> Pipeline<MemoryBlobStore, F, FakeExtractor, CannedModel, RecordingTransport> {
        Pipeline::new(
            SeenStore::new(store),
            feeds,
            FakeExtractor::default(),
            Summarizer::new(CannedModel::replying("Summary.")),
            Notifier::new(RecordingTransport::default(), 4096),
            vec!["feed-a".to_string()],
        )
    }

    struct PanickingFeeds;

    impl FeedSource for PanickingFeeds {
        async fn poll(&self, _endpoint: &str) -> Result<Vec<Item>> {
            panic!("feed parser blew up")
        }
    }

    #[tokio::test]
    async fn test_run_once_publishes_success() {
        let (tx, rx) = status::channel();
        let feeds = FakeFeeds::default().with("feed-a", Some(&["https://a/1"]));
        let scheduler = Scheduler::new(
            pipeline(MemoryBlobStore::default(), feeds),
            DEFAULT_INTERVAL,
            tx,
        );

        let status = scheduler.run_once().await;

        assert!(matches!(status, RunStatus::Succeeded { ref report } if report.delivered == 1));
        assert_eq!(*rx.borrow(), status);
    }

    #[tokio::test]
    async fn test_run_once_publishes_abort() {
        let (tx, rx) = status::channel();
        let store = MemoryBlobStore {
            fail_download: true,
            ..Default::default()
        };
        let scheduler = Scheduler::new(pipeline(store, FakeFeeds::default()), DEFAULT_INTERVAL, tx);

        let status = scheduler.run_once().await;

        assert!(matches!(status, RunStatus::Aborted { .. }));
        assert!(matches!(*rx.borrow(), RunStatus::Aborted { .. }));
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let (tx, _rx) = status::channel();
        let scheduler = Scheduler::new(
            pipeline(MemoryBlobStore::default(), PanickingFeeds),
            DEFAULT_INTERVAL,
            tx,
        );

        let status = scheduler.run_once().await;

        match status {
            RunStatus::Aborted { reason, .. } => assert!(reason.contains("feed parser blew up")),
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_loop_keeps_running_after_aborts_until_shutdown() {
        let (tx, _rx) = status::channel();
        let store = MemoryBlobStore {
            fail_download: true,
            ..Default::default()
        };
        let scheduler = Scheduler::new(
            pipeline(store, FakeFeeds::default()),
            Duration::from_millis(5),
            tx,
        );

        scheduler.run_until(sleep(Duration::from_millis(60))).await;

        let attempts = *scheduler.pipeline.store().backend().downloads.lock().unwrap();
        assert!(attempts >= 2, "expected repeated runs, got {attempts}");
    }
}
