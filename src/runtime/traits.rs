//! Trait abstractions for runtime I/O
//!
//! The outbound side of the runtime; mocks in `testing` stand in for the
//! Telegram client.

use crate::document::Document;
use crate::session::UserId;
use crate::telegram::{NotifyError, TelegramClient};
use async_trait::async_trait;
use std::sync::Arc;

/// Outbound chat messages
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), NotifyError>;

    async fn send_document(
        &self,
        user: UserId,
        document: Document,
        caption: Option<&str>,
    ) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), NotifyError> {
        (**self).send_text(user, text).await
    }

    async fn send_document(
        &self,
        user: UserId,
        document: Document,
        caption: Option<&str>,
    ) -> Result<(), NotifyError> {
        (**self).send_document(user, document, caption).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), NotifyError> {
        self.send_message(user, text).await
    }

    async fn send_document(
        &self,
        user: UserId,
        document: Document,
        caption: Option<&str>,
    ) -> Result<(), NotifyError> {
        TelegramClient::send_document(self, user, document.bytes, &document.filename, caption).await
    }
}
