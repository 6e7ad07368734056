//! Retry-with-backoff wrapper around a single-attempt backend

use super::{GenerationBackend, GenerationError, TextGenerator};
use async_trait::async_trait;
use std::time::Duration;

/// Exponential backoff policy for retryable generation failures.
///
/// The wait before retry `n` (0-based) is `unit * backoff_base^n`, capped at
/// `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub backoff_base: u32,
    pub unit: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: 2,
            unit: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_base.saturating_pow(attempt);
        self.unit.saturating_mul(factor).min(self.max_delay)
    }
}

/// [`TextGenerator`] that retries rate limits and timeouts per a [`RetryPolicy`]
pub struct RetryingGenerator<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: GenerationBackend> RetryingGenerator<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    #[allow(dead_code)] // Used in tests
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: GenerationBackend> TextGenerator for RetryingGenerator<B> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let start = std::time::Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match self.backend.attempt(prompt).await {
                Ok(text) => {
                    tracing::info!(
                        model = %self.backend.model_id(),
                        attempts = attempt + 1,
                        duration_ms = %start.elapsed().as_millis(),
                        chars = text.chars().count(),
                        "Generation completed"
                    );
                    return Ok(text);
                }
                Err(e) if e.kind.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        model = %self.backend.model_id(),
                        attempt = attempt + 1,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Generation attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    let error = if e.kind.is_retryable() {
                        GenerationError::exhausted(attempt + 1, &e)
                    } else {
                        e
                    };
                    tracing::error!(
                        model = %self.backend.model_id(),
                        attempts = attempt + 1,
                        duration_ms = %start.elapsed().as_millis(),
                        kind = ?error.kind,
                        error = %error,
                        "Generation failed"
                    );
                    return Err(error);
                }
            }
        }
    }
}
