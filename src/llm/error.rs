//! Generation error types

use thiserror::Error;

/// Generation error with classification
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::RateLimit, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Timeout, message)
    }

    pub fn http(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Http, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Transport, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GenerationErrorKind::Malformed, message)
    }

    /// Wrap the last retryable error once the attempt ceiling is hit
    pub fn exhausted(attempts: u32, last: &GenerationError) -> Self {
        Self::new(
            GenerationErrorKind::Exhausted,
            format!("Failed after {attempts} attempts: {}", last.message),
        )
    }
}

/// Error classification for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// HTTP 429 - retryable with backoff
    RateLimit,
    /// Request exceeded its timeout - retryable
    Timeout,
    /// Any other non-2xx status - terminal
    Http,
    /// Connection or body read failure - terminal
    Transport,
    /// 2xx with no text at the expected path - terminal
    Malformed,
    /// Retry ceiling reached
    Exhausted,
}

impl GenerationErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimit | Self::Timeout)
    }
}
