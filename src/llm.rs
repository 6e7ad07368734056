//! Text-generation backend abstraction
//!
//! A [`GenerationBackend`] performs exactly one HTTP attempt. The
//! [`RetryingGenerator`] wraps it with the rate-limit backoff policy and is
//! what the rest of the crate consumes through [`TextGenerator`].

mod error;
mod gemini;
mod retry;

pub use error::GenerationError;
pub use gemini::GeminiBackend;
pub use retry::{RetryPolicy, RetryingGenerator};

use async_trait::async_trait;
use std::sync::Arc;

/// Produces text from a prompt; all-or-nothing
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// One request against the upstream service, without retries
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn attempt(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Model identifier, for log fields
    fn model_id(&self) -> &str;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}

#[async_trait]
impl<T: GenerationBackend + ?Sized> GenerationBackend for Arc<T> {
    async fn attempt(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).attempt(prompt).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}
