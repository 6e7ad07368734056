//! Runtime for executing conversations
//!
//! Each user with pending work gets an actor that applies events strictly in
//! arrival order. Actors share one worker pool; generation calls run as
//! separate tasks whose outcome re-enters the owning actor as an event.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::UserRuntime;
pub use traits::*;

use crate::document::DocumentRenderer;
use crate::llm::{GeminiBackend, RetryingGenerator, TextGenerator};
use crate::phrases::PhraseBook;
use crate::session::{SessionStore, UserId};
use crate::state_machine::Event;
use crate::telegram::TelegramClient;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, RwLock, Semaphore};

/// Type alias for the production manager with concrete implementations
pub type ProductionManager =
    RuntimeManager<Arc<dyn SessionStore>, RetryingGenerator<GeminiBackend>, TelegramClient>;

/// Accepts inbound events without waiting for them to be processed
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, user: UserId, event: Event);
}

/// Tunables for the runtime
#[derive(Debug, Clone, Copy)]
pub struct RuntimeSettings {
    /// Ceiling for one outbound text message
    pub max_message_chars: usize,
    /// Permits in the shared worker pool
    pub worker_concurrency: usize,
}

/// An event plus, for generation outcomes, the ticket of the call it settles
#[derive(Debug)]
pub(crate) struct Envelope {
    pub event: Event,
    pub ticket: Option<u64>,
}

impl From<Event> for Envelope {
    fn from(event: Event) -> Self {
        Self {
            event,
            ticket: None,
        }
    }
}

pub(crate) type EnvelopeSender = mpsc::UnboundedSender<Envelope>;
pub(crate) type ActorMap = Arc<RwLock<HashMap<UserId, EnvelopeSender>>>;

/// Collaborators shared by every user actor
pub struct Services<S, G, N> {
    pub store: S,
    pub generator: G,
    pub notifier: N,
    pub phrases: Arc<dyn PhraseBook>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub max_message_chars: usize,
    /// Worker pool; queued work waits for a permit instead of being dropped
    pub pool: Semaphore,
}

/// Manager for all user actors
pub struct RuntimeManager<S, G, N> {
    services: Arc<Services<S, G, N>>,
    actors: ActorMap,
}

impl<S, G, N> RuntimeManager<S, G, N>
where
    S: SessionStore + 'static,
    G: TextGenerator + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        store: S,
        generator: G,
        notifier: N,
        phrases: Arc<dyn PhraseBook>,
        renderer: Arc<dyn DocumentRenderer>,
        settings: RuntimeSettings,
    ) -> Self {
        Self {
            services: Arc::new(Services {
                store,
                generator,
                notifier,
                phrases,
                renderer,
                max_message_chars: settings.max_message_chars,
                pool: Semaphore::new(settings.worker_concurrency.max(1)),
            }),
            actors: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Queue an event for `user`, starting their actor if needed
    pub async fn send_event(&self, user: UserId, event: Event) {
        let mut envelope = Envelope::from(event);

        // Fast path: the actor is running
        {
            let actors = self.actors.read().await;
            if let Some(tx) = actors.get(&user) {
                match tx.send(envelope) {
                    Ok(()) => return,
                    Err(SendError(back)) => envelope = back,
                }
            }
        }

        let mut actors = self.actors.write().await;
        // Another dispatch may have started it while we waited for the lock
        if let Some(tx) = actors.get(&user) {
            match tx.send(envelope) {
                Ok(()) => return,
                Err(SendError(back)) => {
                    tracing::warn!(user_id = %user, "User runtime stopped unexpectedly, restarting");
                    envelope = back;
                }
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(envelope).is_err() {
            return;
        }
        let runtime = UserRuntime::new(user, self.services.clone(), rx, tx.clone(), self.actors.clone());
        actors.insert(user, tx);
        drop(actors);

        tokio::spawn(runtime.run());
    }

    /// Number of users with a live actor
    pub async fn active_users(&self) -> usize {
        self.actors.read().await.len()
    }
}

#[async_trait]
impl<S, G, N> Dispatch for RuntimeManager<S, G, N>
where
    S: SessionStore + 'static,
    G: TextGenerator + 'static,
    N: Notifier + 'static,
{
    async fn dispatch(&self, user: UserId, event: Event) {
        self.send_event(user, event).await;
    }
}
