//! Process configuration resolved from the environment

use crate::chunker::TRANSPORT_MAX_CHARS;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_WORKER_CONCURRENCY: usize = 16;
pub const DEFAULT_FONT_DIR: &str = "fonts";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub telegram_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    /// Public callback registered with Telegram at startup
    pub webhook_url: Option<String>,
    pub port: u16,
    /// Sqlite file for durable sessions; in-memory store when unset
    pub db_path: Option<PathBuf>,
    /// TrueType fonts for notes documents in non-Latin scripts
    pub font_dir: PathBuf,
    pub max_message_chars: usize,
    pub worker_concurrency: usize,
    pub translate_phrases: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve from any variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_token = var("TELEGRAM_TOKEN").ok_or(ConfigError::Missing("TELEGRAM_TOKEN"))?;
        let gemini_api_key = var("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;

        let port = match var("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
                reason: "expected a port number",
            })?,
            None => DEFAULT_PORT,
        };

        let max_message_chars = match var("MAX_MESSAGE_CHARS") {
            Some(value) => match value.parse::<usize>() {
                Ok(n) if (1..=TRANSPORT_MAX_CHARS).contains(&n) => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "MAX_MESSAGE_CHARS",
                        value,
                        reason: "expected 1 to 4096",
                    })
                }
            },
            None => TRANSPORT_MAX_CHARS,
        };

        let worker_concurrency = match var("WORKER_CONCURRENCY") {
            Some(value) => match value.parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "WORKER_CONCURRENCY",
                        value,
                        reason: "expected a positive integer",
                    })
                }
            },
            None => DEFAULT_WORKER_CONCURRENCY,
        };

        let translate_phrases = match var("TRANSLATE_PHRASES") {
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "TRANSLATE_PHRASES",
                        value,
                        reason: "expected true or false",
                    })
                }
            },
            None => false,
        };

        Ok(Self {
            telegram_token,
            gemini_api_key,
            gemini_model: var("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            webhook_url: var("WEBHOOK_URL"),
            port,
            db_path: var("EDGO_DB_PATH").map(PathBuf::from),
            font_dir: var("EDGO_FONT_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_FONT_DIR), PathBuf::from),
            max_message_chars,
            worker_concurrency,
            translate_phrases,
        })
    }
}
