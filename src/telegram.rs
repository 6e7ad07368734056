//! Telegram Bot API transport
//!
//! Outbound text and document sends, webhook registration, and parsing of
//! inbound updates.

use crate::session::UserId;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Per-request ceiling for text sends
pub const TEXT_SEND_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-request ceiling for document uploads
pub const DOCUMENT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request timeout: {0}")]
    Timeout(String),
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Telegram rejected {method} with HTTP {status}: {body}")]
    Rejected {
        method: &'static str,
        status: u16,
        body: String,
    },
}

impl From<reqwest::Error> for NotifyError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NotifyError::Timeout(e.to_string())
        } else {
            NotifyError::Transport(e.to_string())
        }
    }
}

/// Bot API client bound to one bot token
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self::with_base_url(token, TELEGRAM_API_BASE)
    }

    /// Point at a different API host (local bot API server, tests)
    pub fn with_base_url(token: String, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    /// Send one message with Markdown formatting.
    ///
    /// Generated text often carries Markdown that Telegram's parser rejects;
    /// a 400 is retried once as plain text.
    pub async fn send_message(&self, chat: UserId, text: &str) -> Result<(), NotifyError> {
        let formatted = json!({
            "chat_id": chat.0,
            "text": text,
            "parse_mode": "Markdown",
        });
        match self.post_json("sendMessage", &formatted).await {
            Err(NotifyError::Rejected { status, .. }) if status == StatusCode::BAD_REQUEST.as_u16() => {
                tracing::debug!(chat = %chat, "Markdown rejected, resending as plain text");
                let plain = json!({ "chat_id": chat.0, "text": text });
                self.post_json("sendMessage", &plain).await
            }
            other => other,
        }
    }

    /// Upload a document with a filename and optional caption
    pub async fn send_document(
        &self,
        chat: UserId,
        bytes: Vec<u8>,
        filename: &str,
        caption: Option<&str>,
    ) -> Result<(), NotifyError> {
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let mut form = Form::new()
            .text("chat_id", chat.0.to_string())
            .part("document", part);
        if let Some(caption) = caption.map(str::trim).filter(|c| !c.is_empty()) {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .client
            .post(self.api_url("sendDocument"))
            .timeout(DOCUMENT_SEND_TIMEOUT)
            .multipart(form)
            .send()
            .await?;
        check_status("sendDocument", response).await
    }

    /// Register the public callback URL for inbound updates
    pub async fn set_webhook(&self, url: &str) -> Result<(), NotifyError> {
        self.post_json("setWebhook", &json!({ "url": url })).await
    }

    async fn post_json(
        &self,
        method: &'static str,
        body: &serde_json::Value,
    ) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.api_url(method))
            .timeout(TEXT_SEND_TIMEOUT)
            .json(body)
            .send()
            .await?;
        check_status(method, response).await
    }
}

async fn check_status(method: &'static str, response: reqwest::Response) -> Result<(), NotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(NotifyError::Rejected {
        method,
        status: status.as_u16(),
        body,
    })
}

// ============================================================================
// Inbound updates
// ============================================================================

/// The subset of a Telegram `Update` the bot reacts to
#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// Chat id and trimmed text, if this update carries a text message
    pub fn into_text_message(self) -> Option<(UserId, String)> {
        let message = self.message?;
        let text = message.text?.trim().to_string();
        if text.is_empty() {
            return None;
        }
        Some((UserId(message.chat.id), text))
    }
}

/// Parse a raw webhook body; any unexpected shape yields `None`
pub fn parse_update(body: &[u8]) -> Option<(UserId, String)> {
    serde_json::from_slice::<Update>(body)
        .ok()
        .and_then(Update::into_text_message)
}
