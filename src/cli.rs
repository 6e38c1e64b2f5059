//! Command-line interface definitions for Feed Relay.
//!
//! Every flag is optional and overrides the matching value from the settings
//! file. Secrets are normally read from the environment.

use clap::Parser;
use std::path::PathBuf;

/// Poll news feeds, summarize new articles and relay them to a Telegram chat.
///
/// # Examples
///
/// ```sh
/// # Run forever with the default feeds, keeping seen links in a local file
/// TELEGRAM_BOT_TOKEN=... TELEGRAM_CHAT_ID=... feed_relay
///
/// # One pass from cron, seen links in a Hub dataset
/// feed_relay --once --hub-repo someone/relay-db --config /etc/feed_relay.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Feed URL to poll; repeat for several feeds (replaces the configured list)
    #[arg(short, long)]
    pub feed: Vec<String>,

    /// Seconds to wait between runs
    #[arg(short, long)]
    pub interval_secs: Option<u64>,

    /// Run a single pass and exit
    #[arg(long)]
    pub once: bool,

    /// Process at most this many new articles per feed in one run
    #[arg(long)]
    pub max_items_per_feed: Option<usize>,

    /// Local file holding the seen links
    #[arg(long, env = "SEEN_FILE")]
    pub seen_file: Option<PathBuf>,

    /// Hugging Face dataset repo (owner/name) holding the seen links
    #[arg(long, env = "HUB_REPO")]
    pub hub_repo: Option<String>,

    /// Hugging Face token with write access to the dataset repo
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat id receiving the summaries (group ids are negative)
    #[arg(long, env = "TELEGRAM_CHAT_ID", allow_negative_numbers = true)]
    pub telegram_chat_id: Option<String>,

    /// Base URL of the OpenAI-compatible model API
    #[arg(long, env = "LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Model name sent with each summarization request
    #[arg(long, env = "LLM_MODEL")]
    pub llm_model: Option<String>,

    /// API key for the model API
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    /// Write the latest run status as JSON to this file
    #[arg(long, env = "STATUS_FILE")]
    pub status_file: Option<PathBuf>,
}
