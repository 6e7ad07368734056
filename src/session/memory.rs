//! In-memory session store with per-user slots

use super::{SessionPatch, SessionStore, StoreError, UserId};
use crate::state_machine::Session;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

type Slot = Arc<Mutex<Option<Session>>>;

/// Map of per-user slots.
///
/// The outer lock is held only long enough to find or create a slot; the
/// read-modify-write itself happens under that user's slot lock, so
/// different users never contend.
#[derive(Default)]
pub struct MemorySessionStore {
    slots: RwLock<HashMap<UserId, Slot>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, user: UserId) -> Slot {
        if let Some(slot) = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
        {
            return slot.clone();
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user)
            .or_default()
            .clone()
    }

    /// Number of users with a live session
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user: UserId) -> Result<Option<Session>, StoreError> {
        let slot = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .cloned();
        Ok(slot.and_then(|slot| slot.lock().unwrap_or_else(PoisonError::into_inner).clone()))
    }

    async fn set(&self, user: UserId, session: Session) -> Result<(), StoreError> {
        let slot = self.slot(user);
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session);
        Ok(())
    }

    async fn update(&self, user: UserId, patch: SessionPatch) -> Result<Session, StoreError> {
        let slot = self.slot(user);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let session = guard.get_or_insert_with(Session::default);
        patch.apply(session);
        Ok(session.clone())
    }

    async fn delete(&self, user: UserId) -> Result<(), StoreError> {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get(&user) {
            *slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
            // Keep the entry while another caller still holds the slot
            if Arc::strong_count(slot) == 1 {
                slots.remove(&user);
            }
        }
        Ok(())
    }
}
