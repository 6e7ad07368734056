//! Session store abstraction
//!
//! One snapshot per user. All operations for the same user are atomic with
//! respect to each other; operations on different users never block each
//! other.

mod memory;

pub use memory::MemorySessionStore;

use crate::state_machine::{Session, Step};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Chat identifier assigned by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partial update merged into an existing session, or into a fresh one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub step: Option<Step>,
    pub topic: Option<String>,
    pub language: Option<String>,
    pub notes: Option<String>,
    pub processing: Option<bool>,
}

impl SessionPatch {
    pub fn step(mut self, step: Step) -> Self {
        self.step = Some(step);
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn processing(mut self, processing: bool) -> Self {
        self.processing = Some(processing);
        self
    }

    /// Overwrite the fields this patch carries
    pub fn apply(self, session: &mut Session) {
        if let Some(step) = self.step {
            session.step = step;
        }
        if let Some(topic) = self.topic {
            session.topic = Some(topic);
        }
        if let Some(language) = self.language {
            session.language = Some(language);
        }
        if let Some(notes) = self.notes {
            session.notes = Some(notes);
        }
        if let Some(processing) = self.processing {
            session.processing = processing;
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DbError),
    #[error("Session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Per-user session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user: UserId) -> Result<Option<Session>, StoreError>;

    async fn set(&self, user: UserId, session: Session) -> Result<(), StoreError>;

    /// Merge `patch` into the stored session, creating one at `Menu` if absent
    async fn update(&self, user: UserId, patch: SessionPatch) -> Result<Session, StoreError>;

    async fn delete(&self, user: UserId) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn get(&self, user: UserId) -> Result<Option<Session>, StoreError> {
        (**self).get(user).await
    }

    async fn set(&self, user: UserId, session: Session) -> Result<(), StoreError> {
        (**self).set(user, session).await
    }

    async fn update(&self, user: UserId, patch: SessionPatch) -> Result<Session, StoreError> {
        (**self).update(user, patch).await
    }

    async fn delete(&self, user: UserId) -> Result<(), StoreError> {
        (**self).delete(user).await
    }
}
