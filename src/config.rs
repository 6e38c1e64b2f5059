//! Runtime settings.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. built-in defaults ([`Settings::default`])
//! 2. an optional YAML file (`--config`)
//! 3. command-line flags and their environment variables ([`Settings::apply_cli`])
//!
//! # Example `config.yaml`
//!
//! ```yaml
//! feeds:
//!   - https://www.thehindu.com/news/national/?service=rss
//! interval_secs: 900
//! max_items_per_feed: 1
//! store:
//!   hub_repo: someone/relay-db
//! telegram:
//!   chat_id: "-100123456"
//! llm:
//!   base_url: http://localhost:11434/v1
//!   model: qwen2.5:3b
//! status_file: /var/lib/feed_relay/status.json
//! ```
//!
//! Secrets (bot token, Hub token, model API key) may live in the file but are
//! normally supplied through the environment.

use crate::cli::Cli;
use crate::error::{RelayError, Result};
use crate::notify::{DEFAULT_TELEGRAM_API, TELEGRAM_MAX_MESSAGE_CHARS};
use crate::scrapers::article::DEFAULT_MIN_PARAGRAPH_CHARS;
use crate::store::hub::DEFAULT_HUB_ENDPOINT;
use crate::summarize::{DEFAULT_MAX_INPUT_CHARS, DEFAULT_MAX_SUMMARY_CHARS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_FEEDS: [&str; 4] = [
    "https://www.news18.com/rss/india.xml",
    "https://feeds.feedburner.com/NDTV-Latest",
    "https://www.hindustantimes.com/feeds/rss/latest-news/rssfeed.xml",
    "https://www.thehindu.com/news/national/?service=rss",
];

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// RSS/Atom endpoints, polled in this order.
    pub feeds: Vec<String>,
    /// Wait between runs, in seconds.
    pub interval_secs: u64,
    /// Run a single pass and exit.
    pub once: bool,
    /// Cap on unseen items one feed contributes to a run. Unset means no cap.
    pub max_items_per_feed: Option<usize>,
    pub limits: Limits,
    pub http: HttpSettings,
    pub store: StoreSettings,
    pub telegram: TelegramSettings,
    pub llm: LlmSettings,
    /// Where to mirror the latest run status as JSON.
    pub status_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feeds: DEFAULT_FEEDS.iter().map(|f| f.to_string()).collect(),
            interval_secs: 1800,
            once: false,
            max_items_per_feed: None,
            limits: Limits::default(),
            http: HttpSettings::default(),
            store: StoreSettings::default(),
            telegram: TelegramSettings::default(),
            llm: LlmSettings::default(),
            status_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Article characters sent to the model.
    pub max_input_chars: usize,
    /// Summary characters kept from the model reply.
    pub max_summary_chars: usize,
    /// Whole-message limit of the transport.
    pub max_message_chars: usize,
    /// Paragraphs shorter than this are dropped during extraction.
    pub min_paragraph_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
            max_message_chars: TELEGRAM_MAX_MESSAGE_CHARS,
            min_paragraph_chars: DEFAULT_MIN_PARAGRAPH_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: format!("feed_relay/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the seen links live. A Hub repository wins over the local file
/// when both are set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub seen_file: PathBuf,
    /// Dataset repository id (`owner/name`) on the Hugging Face Hub.
    pub hub_repo: Option<String>,
    pub hub_filename: String,
    pub hub_revision: String,
    pub hub_endpoint: String,
    pub hub_token: Option<Secret>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            seen_file: PathBuf::from("seen_links.txt"),
            hub_repo: None,
            hub_filename: "seen_links.txt".to_string(),
            hub_revision: "main".to_string(),
            hub_endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            hub_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub api_base: String,
    pub chat_id: Option<String>,
    pub token: Option<Secret>,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_TELEGRAM_API.to_string(),
            chat_id: None,
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<Secret>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: String,
    /// Retries for transient model API failures.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5:3b".to_string(),
            api_key: None,
            max_tokens: 256,
            temperature: 0.2,
            system_prompt: "You summarize news articles. Answer with a short, neutral summary \
                            of two to four sentences in plain text, without preamble."
                .to_string(),
            max_retries: 3,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Settings {
    /// Parse settings from YAML text. Missing keys keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RelayError::Config(e.to_string()))
    }

    /// Read and parse a YAML settings file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let settings = Self::from_yaml(&yaml)?;
        info!(feeds = settings.feeds.len(), "Loaded settings file");
        Ok(settings)
    }

    /// Defaults, then the file named by `--config` (if any), then CLI flags.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let mut settings = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        settings.apply_cli(cli);
        settings.validate()?;
        Ok(settings)
    }

    /// Overlay every flag the user actually set.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if !cli.feed.is_empty() {
            self.feeds = cli.feed.clone();
        }
        if let Some(secs) = cli.interval_secs {
            self.interval_secs = secs;
        }
        if cli.once {
            self.once = true;
        }
        if cli.max_items_per_feed.is_some() {
            self.max_items_per_feed = cli.max_items_per_feed;
        }
        if let Some(path) = &cli.seen_file {
            self.store.seen_file = path.clone();
        }
        if let Some(repo) = &cli.hub_repo {
            self.store.hub_repo = Some(repo.clone());
        }
        if let Some(token) = &cli.hf_token {
            self.store.hub_token = Some(Secret::new(token));
        }
        if let Some(token) = &cli.telegram_bot_token {
            self.telegram.token = Some(Secret::new(token));
        }
        if let Some(chat_id) = &cli.telegram_chat_id {
            self.telegram.chat_id = Some(chat_id.clone());
        }
        if let Some(url) = &cli.llm_base_url {
            self.llm.base_url = url.clone();
        }
        if let Some(model) = &cli.llm_model {
            self.llm.model = model.clone();
        }
        if let Some(key) = &cli.llm_api_key {
            self.llm.api_key = Some(Secret::new(key));
        }
        if let Some(path) = &cli.status_file {
            self.status_file = Some(path.clone());
        }
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(RelayError::Config(msg.to_string()));

        if self.feeds.is_empty() {
            return fail("at least one feed is required");
        }
        if let Some(bad) = self.feeds.iter().find(|f| url::Url::parse(f).is_err()) {
            return Err(RelayError::Config(format!("invalid feed URL: {bad}")));
        }
        if self.interval_secs == 0 {
            return fail("interval_secs must be greater than zero");
        }
        if self.max_items_per_feed == Some(0) {
            return fail("max_items_per_feed must be greater than zero when set");
        }
        if self.limits.max_input_chars == 0 || self.limits.max_summary_chars == 0 {
            return fail("summary limits must be greater than zero");
        }
        if self.limits.max_message_chars > TELEGRAM_MAX_MESSAGE_CHARS {
            return Err(RelayError::Config(format!(
                "max_message_chars exceeds the Telegram limit of {TELEGRAM_MAX_MESSAGE_CHARS}"
            )));
        }
        if self.telegram.token.as_ref().is_none_or(|t| t.expose().is_empty()) {
            return fail("Telegram bot token missing (set TELEGRAM_BOT_TOKEN)");
        }
        if self.telegram.chat_id.as_deref().is_none_or(str::is_empty) {
            return fail("Telegram chat id missing (set TELEGRAM_CHAT_ID)");
        }
        if let Some(repo) = &self.store.hub_repo {
            if repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
                return Err(RelayError::Config(format!(
                    "hub_repo must look like owner/name, got {repo}"
                )));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
