//! # Feed Relay
//!
//! A long-running relay that polls news feeds, summarizes every article it
//! has not relayed before, and posts the summary to a Telegram chat.
//!
//! ## Features
//!
//! - Polls a configured list of RSS/Atom feeds (Indian national news by default)
//! - Extracts article text from the linked pages
//! - Summarizes through an OpenAI-compatible model API
//! - Delivers plain-text summaries to one Telegram chat
//! - Remembers relayed links in a local file or a Hugging Face dataset, so a
//!   restart never re-sends what was already delivered
//!
//! ## Usage
//!
//! ```sh
//! TELEGRAM_BOT_TOKEN=... TELEGRAM_CHAT_ID=... feed_relay --hub-repo someone/relay-db
//! ```
//!
//! ## Architecture
//!
//! Every run follows the same pipeline:
//! 1. **Load**: read the seen links; abort the run if the store is unreachable
//! 2. **Enumerate**: poll each feed, skipping feeds that fail
//! 3. **Filter**: keep links not seen before, each link once
//! 4. **Relay**: extract → summarize → notify, one article at a time, marking
//!    a link seen only after its message was delivered
//! 5. **Persist**: write the seen links back if anything was delivered
//!
//! The scheduler repeats the run every `interval_secs` (30 minutes by default).

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod notify;
mod pipeline;
mod scheduler;
mod scrapers;
mod status;
mod store;
mod summarize;
#[cfg(test)]
mod testing;
mod utils;

use api::{ChatCompletionClient, ChatSettings, RetryAsk};
use cli::Cli;
use config::Settings;
use notify::{Notifier, TelegramTransport};
use pipeline::Pipeline;
use reqwest::Client;
use scheduler::Scheduler;
use scrapers::article::HtmlExtractor;
use scrapers::feed::HttpFeedSource;
use status::RunStatus;
use store::{AnyBlobStore, FileBlobStore, HubBlobStore, SeenStore};
use summarize::Summarizer;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feed_relay starting up");

    let args = Cli::parse();
    debug!(?args.config, once = args.once, "Parsed CLI arguments");

    let settings = match Settings::resolve(&args) {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    debug!(?settings, "Resolved settings");

    // One client for every outbound call; it pools connections across runs.
    let http = scrapers::http_client(&settings.http.user_agent, settings.http.timeout())?;

    let store = build_store(&settings, &http).await?;
    info!(?store, "Seen-links store ready");

    let chat = ChatSettings {
        base_url: settings.llm.base_url.clone(),
        api_key: settings.llm.api_key.as_ref().map(|k| k.expose().to_string()),
        model: settings.llm.model.clone(),
        system_prompt: settings.llm.system_prompt.clone(),
        max_tokens: settings.llm.max_tokens,
        temperature: settings.llm.temperature,
    };
    let model = RetryAsk::new(
        ChatCompletionClient::new(http.clone(), chat),
        settings.llm.max_retries,
        Duration::from_millis(settings.llm.retry_base_delay_ms),
    );
    let summarizer = Summarizer::new(model)
        .with_limits(settings.limits.max_input_chars, settings.limits.max_summary_chars);

    let token = settings
        .telegram
        .token
        .as_ref()
        .ok_or("Telegram bot token missing")?;
    let chat_id = settings
        .telegram
        .chat_id
        .as_deref()
        .ok_or("Telegram chat id missing")?;
    let transport = TelegramTransport::new(http.clone(), token.expose(), chat_id)
        .with_api_base(&settings.telegram.api_base);
    let notifier = Notifier::new(transport, settings.limits.max_message_chars);

    let pipeline = Pipeline::new(
        SeenStore::new(store),
        HttpFeedSource::new(http.clone()),
        HtmlExtractor::new(http).with_min_paragraph_chars(settings.limits.min_paragraph_chars),
        summarizer,
        notifier,
        settings.feeds.clone(),
    )
    .with_max_items_per_feed(settings.max_items_per_feed);

    let (status_tx, status_rx) = status::channel();
    let writer = settings
        .status_file
        .clone()
        .map(|path| status::spawn_file_writer(status_rx, path));

    let scheduler = Scheduler::new(pipeline, settings.interval(), status_tx);

    let outcome = if settings.once {
        scheduler.run_once().await
    } else {
        scheduler.run_until(shutdown_signal()).await;
        RunStatus::Starting
    };

    // Dropping the scheduler closes the status channel so the writer drains and exits.
    drop(scheduler);
    if let Some(writer) = writer {
        if let Err(e) = writer.await {
            warn!(error = %e, "Status writer task failed");
        }
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, secs = elapsed.as_secs(), "Execution complete");

    match outcome {
        RunStatus::Aborted { reason, .. } => Err(reason.into()),
        _ => Ok(()),
    }
}

/// Pick the seen-links backend: a Hub dataset when `hub_repo` is set,
/// otherwise a local file whose directory must be writable.
async fn build_store(settings: &Settings, http: &Client) -> Result<AnyBlobStore, Box<dyn Error>> {
    let cfg = &settings.store;

    if let Some(repo) = &cfg.hub_repo {
        if cfg.hub_token.is_none() {
            warn!(%repo, "No Hugging Face token; uploads to the dataset will be rejected");
        }
        let hub = HubBlobStore::new(
            http.clone(),
            repo,
            &cfg.hub_filename,
            cfg.hub_token.as_ref().map(|t| t.expose().to_string()),
        )
        .with_endpoint(&cfg.hub_endpoint)
        .with_revision(&cfg.hub_revision);
        return Ok(AnyBlobStore::Hub(hub));
    }

    let file = FileBlobStore::new(&cfg.seen_file);
    let dir = file
        .path()
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    if let Err(e) = ensure_writable_dir(dir).await {
        error!(
            path = %dir.display(),
            error = %e,
            "Seen-links directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    Ok(AnyBlobStore::File(file))
}

/// Resolves on Ctrl-C. If the signal handler cannot be installed the relay
/// keeps running until killed.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
