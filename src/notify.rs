//! Notifier adapter and the Telegram transport.
//!
//! [`Notifier`] owns the message layout and the size limit; a [`Transport`]
//! only moves a finished message to the destination.
//!
//! # Message layout
//!
//! ```text
//! 🆕 New Article Summary
//! Source: <feed title>
//! Title: <title>
//! Summary:
//! <summary>
//! Link: <link>
//! ```
//!
//! When the message would exceed the transport limit, the summary is
//! shortened first; the title and source are capped to a share of the limit
//! so a runaway headline cannot push the message over it.

use crate::error::{RelayError, Result};
use crate::models::{Item, Summary};
use crate::utils::{truncate_chars, truncate_for_log};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::fmt;
use tracing::{info, instrument, warn};

/// Telegram rejects `sendMessage` texts longer than this many characters.
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

/// Delivers a finished message to the single configured destination.
pub trait Transport {
    async fn send(&self, text: &str) -> std::result::Result<(), Box<dyn Error>>;
}

/// Render the notification text for one item, fitting it into `max_chars`.
///
/// The title gets at most a quarter of the budget and the summary takes what
/// is left. Only a link longer than the whole budget can cut into the tail.
pub fn format_message(item: &Item, summary: &Summary, max_chars: usize) -> String {
    let title = shorten(&item.title, max_chars / 4);

    let mut head = String::from("🆕 New Article Summary\n");
    if let Some(source) = &item.source {
        head.push_str(&format!("Source: {}\n", shorten(source, max_chars / 8)));
    }
    head.push_str(&format!("Title: {}\nSummary:\n", title));
    let tail = format!("\nLink: {}", item.link);

    let fixed = head.chars().count() + tail.chars().count();
    let room = max_chars.saturating_sub(fixed);
    let body = shorten(summary.as_str(), room);

    let message = format!("{head}{body}{tail}");
    if message.chars().count() > max_chars {
        warn!(link = %truncate_for_log(&item.link, 80), "Link alone exceeds the message limit");
        return truncate_chars(&message, max_chars).to_string();
    }
    message
}

/// `text` cut to `max` characters, ending in `…` when anything was dropped.
fn shorten(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else if max == 0 {
        String::new()
    } else {
        format!("{}…", truncate_chars(text, max - 1))
    }
}

#[derive(Debug)]
pub struct Notifier<T> {
    transport: T,
    max_message_chars: usize,
}

impl<T: Transport> Notifier<T> {
    pub fn new(transport: T, max_message_chars: usize) -> Self {
        Self {
            transport,
            max_message_chars,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Format and deliver the summary of `item`.
    ///
    /// # Errors
    ///
    /// [`RelayError::DeliveryFailed`] when the transport reports failure.
    #[instrument(level = "info", skip_all, fields(link = %item.link))]
    pub async fn notify(&self, item: &Item, summary: &Summary) -> Result<()> {
        let message = format_message(item, summary, self.max_message_chars);
        match self.transport.send(&message).await {
            Ok(()) => {
                info!("Message delivered");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Message delivery failed");
                Err(RelayError::DeliveryFailed(e.to_string()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends plain-text messages through the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl fmt::Debug for TelegramTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramTransport")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .field("token", &"***")
            .finish()
    }
}

impl TelegramTransport {
    pub fn new(client: Client, token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            api_base: DEFAULT_TELEGRAM_API.to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

impl Transport for TelegramTransport {
    #[instrument(level = "debug", skip_all, fields(chat_id = %self.chat_id))]
    async fn send(&self, text: &str) -> std::result::Result<(), Box<dyn Error>> {
        let payload = json!({ "chat_id": self.chat_id, "text": text });
        let response = self.client.post(self.send_url()).json(&payload).send().await?;

        let status = response.status();
        let body = response.text().await?;
        let reply: Option<TelegramReply> = serde_json::from_str(&body).ok();

        match reply {
            Some(r) if status.is_success() && r.ok => Ok(()),
            Some(r) => Err(format!(
                "HTTP {}: {}",
                status,
                r.description.unwrap_or_else(|| "unknown error".to_string())
            )
            .into()),
            None => Err(format!("HTTP {}: {}", status, truncate_for_log(&body, 200)).into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::testing::{self, CannedServer};
    use std::sync::Mutex;

    /// Transport fake recording every message; fails for texts containing
    /// any of `fail_on`.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingTransport {
        pub sent: Mutex<Vec<String>>,
        pub fail_on: Vec<String>,
    }

    impl RecordingTransport {
        pub fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        async fn send(&self, text: &str) -> std::result::Result<(), Box<dyn Error>> {
            if self.fail_on.iter().any(|needle| text.contains(needle.as_str())) {
                return Err("chat not found".into());
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn item() -> Item {
        Item::new("https://news.example.com/1", "Budget tabled").with_source("Example National")
    }

    #[test]
    fn test_format_message_layout() {
        let msg = format_message(&item(), &Summary("Taxes go down.".into()), 4096);
        assert_eq!(
            msg,
            "🆕 New Article Summary\nSource: Example National\nTitle: Budget tabled\nSummary:\nTaxes go down.\nLink: https://news.example.com/1"
        );
    }

    #[test]
    fn test_format_message_without_source() {
        let item = Item::new("https://a/1", "Headline");
        let msg = format_message(&item, &Summary("S".into()), 4096);
        assert!(!msg.contains("Source:"));
        assert!(msg.starts_with("🆕 New Article Summary\nTitle: Headline\n"));
    }

    #[test]
    fn test_format_message_truncates_only_summary() {
        let summary = Summary("x".repeat(10_000));
        let msg = format_message(&item(), &summary, TELEGRAM_MAX_MESSAGE_CHARS);
        assert_eq!(msg.chars().count(), TELEGRAM_MAX_MESSAGE_CHARS);
        assert!(msg.contains("Title: Budget tabled"));
        assert!(msg.ends_with("…\nLink: https://news.example.com/1"));
    }

    #[test]
    fn test_format_message_bounds_long_title() {
        let item = Item::new("https://news.example.com/1", "t".repeat(5000)).with_source("Example");
        let msg = format_message(&item, &Summary("Short summary.".into()), TELEGRAM_MAX_MESSAGE_CHARS);

        assert!(msg.chars().count() <= TELEGRAM_MAX_MESSAGE_CHARS);
        assert!(msg.contains(&format!("Title: {}…\n", "t".repeat(1023))));
        assert!(msg.contains("Short summary."));
        assert!(msg.ends_with("\nLink: https://news.example.com/1"));
    }

    #[test]
    fn test_format_message_never_exceeds_limit() {
        let long_link = format!("https://news.example.com/{}", "x".repeat(6000));
        let cases = [
            Item::new("https://a/1", "t".repeat(5000)).with_source("s".repeat(3000)),
            Item::new(long_link.as_str(), "Headline"),
        ];
        for item in &cases {
            for max in [100, 500, TELEGRAM_MAX_MESSAGE_CHARS] {
                let msg = format_message(item, &Summary("y".repeat(8000)), max);
                assert!(msg.chars().count() <= max, "{} > {}", msg.chars().count(), max);
            }
        }
    }

    #[tokio::test]
    async fn test_notify_maps_transport_failure() {
        let notifier = Notifier::new(
            RecordingTransport {
                fail_on: vec!["Budget".into()],
                ..Default::default()
            },
            4096,
        );
        let err = notifier
            .notify(&item(), &Summary("s".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::DeliveryFailed(_)));
        assert!(notifier.transport().messages().is_empty());
    }

    #[tokio::test]
    async fn test_notify_delivers() {
        let notifier = Notifier::new(RecordingTransport::default(), 4096);
        notifier.notify(&item(), &Summary("s".into())).await.unwrap();
        assert_eq!(notifier.transport().messages().len(), 1);
    }

    #[test]
    fn test_telegram_url_and_debug() {
        let t = TelegramTransport::new(Client::new(), "123:abc", "-10042")
            .with_api_base("http://localhost:8081/");
        assert_eq!(t.send_url(), "http://localhost:8081/bot123:abc/sendMessage");
        assert!(!format!("{t:?}").contains("123:abc"));
    }

    #[test]
    fn test_telegram_reply_parsing() {
        let r: TelegramReply =
            serde_json::from_str(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
                .unwrap();
        assert!(!r.ok);
        assert_eq!(r.description.as_deref(), Some("Bad Request: chat not found"));
    }

    fn telegram(server: &CannedServer) -> TelegramTransport {
        TelegramTransport::new(testing::client(), "123:abc", "-100").with_api_base(&server.base_url)
    }

    #[tokio::test]
    async fn test_telegram_send_ok() {
        let server = CannedServer::start("200 OK", &[], r#"{"ok":true,"result":{}}"#).await;
        telegram(&server).send("hello").await.unwrap();
        assert_eq!(server.requests(), ["POST /bot123:abc/sendMessage HTTP/1.1"]);
    }

    #[tokio::test]
    async fn test_telegram_ok_false_is_error() {
        let server =
            CannedServer::start("200 OK", &[], r#"{"ok":false,"description":"Forbidden: bot was kicked"}"#)
                .await;
        let err = telegram(&server).send("hello").await.unwrap_err();
        assert!(err.to_string().contains("bot was kicked"));
    }

    #[tokio::test]
    async fn test_telegram_error_status_is_error() {
        let server = CannedServer::start(
            "400 Bad Request",
            &[],
            r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#,
        )
        .await;
        let err = telegram(&server).send("hello").await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));

        let server = CannedServer::start("502 Bad Gateway", &[], "<html>bad gateway</html>").await;
        let err = telegram(&server).send("hello").await.unwrap_err();
        assert!(err.to_string().contains("502"));
    }
}
