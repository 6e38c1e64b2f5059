//! Run status published to passive observers.
//!
//! The scheduler publishes the outcome of every run on a
//! [`tokio::sync::watch`] channel. Observers only read the latest value; the
//! one shipped here mirrors it to a JSON file so an operator (or a health
//! check) can see when the relay last ran and how it went.
//!
//! # Status file
//!
//! ```json
//! {"state":"succeeded","report":{"started_at":"2025-05-06T08:00:00Z","delivered":3,...}}
//! {"state":"aborted","reason":"seen-set store unavailable: ...","at":"2025-05-06T08:30:00Z"}
//! ```

use crate::models::RunReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

/// Outcome of the most recent run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// No run has finished yet.
    #[default]
    Starting,
    Succeeded { report: RunReport },
    Aborted { reason: String, at: DateTime<Utc> },
}

impl RunStatus {
    pub fn aborted(reason: impl Into<String>) -> Self {
        RunStatus::Aborted {
            reason: reason.into(),
            at: Utc::now(),
        }
    }
}

/// Create the status channel, starting at [`RunStatus::Starting`].
pub fn channel() -> (watch::Sender<RunStatus>, watch::Receiver<RunStatus>) {
    watch::channel(RunStatus::default())
}

/// Write `status` as JSON to `path`, creating parent directories.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn write_status(status: &RunStatus, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(status)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create status dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    debug!("Wrote status file");
    Ok(())
}

/// Mirror every published status to `path` until the sender is dropped.
///
/// Write failures are logged and do not stop the observer.
pub fn spawn_file_writer(mut rx: watch::Receiver<RunStatus>, path: PathBuf) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(path = %path.display(), "Status file writer started");
        while rx.changed().await.is_ok() {
            let status = rx.borrow_and_update().clone();
            if let Err(e) = write_status(&status, &path).await {
                error!(path = %path.display(), error = %e, "Failed to write status file");
            }
        }
        debug!("Status channel closed");
    })
}
