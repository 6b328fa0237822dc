//! Outbound alerts.
//!
//! Delivery is best effort: the scan cycle logs a failed send and moves on.

use serde::Deserialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::config::AppConfig;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// Which chat a message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Status messages and reports.
    Main,
    /// Per-signal alerts; falls back to the main chat when unset.
    Signal,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier transport: {0}")]
    Transport(String),
    #[error("notifier rejected message (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },
}

pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `text` (HTML); returns the message id when the service reports one.
    fn send(&self, text: &str, channel: Channel) -> Result<Option<i64>, NotifyError>;
}

/// Send and swallow the error after logging it.
pub fn send_best_effort(notifier: &dyn Notifier, text: &str, channel: Channel) -> Option<i64> {
    match notifier.send(text, channel) {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(notifier = notifier.name(), error = %e, "notification not delivered");
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
}

/// Telegram Bot API `sendMessage` with HTML parse mode.
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    api_base: String,
    token: String,
    chat_id: String,
    signal_chat_id: String,
}

impl TelegramNotifier {
    pub fn new(
        token: impl Into<String>,
        chat_id: impl Into<String>,
        signal_chat_id: Option<String>,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        let chat_id = chat_id.into();
        Ok(Self {
            client,
            api_base: TELEGRAM_API.to_string(),
            token: token.into(),
            signal_chat_id: signal_chat_id.unwrap_or_else(|| chat_id.clone()),
            chat_id,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn chat_for(&self, channel: Channel) -> &str {
        match channel {
            Channel::Main => &self.chat_id,
            Channel::Signal => &self.signal_chat_id,
        }
    }
}

impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn send(&self, text: &str, channel: Channel) -> Result<Option<i64>, NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.token);
        let body = serde_json::json!({
            "chat_id": self.chat_for(channel),
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        // The URL embeds the token, so transport errors are reported without it.
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;
        let status = resp.status();
        let parsed: TelegramResponse = resp
            .json()
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;
        if !status.is_success() || !parsed.ok {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: parsed.description.unwrap_or_default(),
            });
        }
        Ok(parsed.result.map(|m| m.message_id))
    }
}

/// Writes messages to the log; used when no bot token is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn send(&self, text: &str, channel: Channel) -> Result<Option<i64>, NotifyError> {
        tracing::info!(?channel, "{text}");
        Ok(None)
    }
}

/// Keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<(Channel, String)>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every send fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<(Channel, String)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        "memory"
    }

    fn send(&self, text: &str, channel: Channel) -> Result<Option<i64>, NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport("injected failure".into()));
        }
        let mut sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        sent.push((channel, text.to_string()));
        Ok(Some(sent.len() as i64))
    }
}

/// Telegram when token and chat id are configured, the log otherwise.
pub fn notifier_from_config(config: &AppConfig) -> Box<dyn Notifier> {
    let secrets = &config.secrets;
    match (&secrets.telegram_bot_token, &secrets.telegram_chat_id) {
        (Some(token), Some(chat)) => {
            match TelegramNotifier::new(
                token.clone(),
                chat.clone(),
                secrets.telegram_signal_chat_id.clone(),
            ) {
                Ok(tg) => Box::new(tg),
                Err(e) => {
                    tracing::warn!(error = %e, "telegram unavailable, logging alerts instead");
                    Box::new(LogNotifier)
                }
            }
        }
        _ => {
            tracing::info!("no telegram token configured, logging alerts instead");
            Box::new(LogNotifier)
        }
    }
}
