//! Per-user runtime executor

use super::traits::Notifier;
use super::{ActorMap, Envelope, EnvelopeSender, Services};
use crate::chunker::chunk;
use crate::llm::TextGenerator;
use crate::phrases::{fill_keywords, fill_topic, Phrase};
use crate::session::{SessionStore, StoreError, UserId};
use crate::state_machine::state::DEFAULT_LANGUAGE;
use crate::state_machine::{
    transition, Effect, Event, Keywords, Mode, Notice, Session, Step, TransitionError, TurnContext,
};
use crate::telegram::NotifyError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Actor that owns one user's event stream.
///
/// Events are processed one at a time, so the read-transition-write cycle
/// for a user never interleaves with another of their events.
pub struct UserRuntime<S, G, N> {
    user: UserId,
    services: Arc<Services<S, G, N>>,
    event_rx: mpsc::UnboundedReceiver<Envelope>,
    /// Handed to generation tasks so their outcome comes back here
    event_tx: EnvelopeSender,
    actors: ActorMap,
    /// Generation calls whose outcome has not been received yet
    in_flight: usize,
    next_ticket: u64,
    /// Ticket of the most recent generation call
    current_ticket: Option<u64>,
}

impl<S, G, N> UserRuntime<S, G, N>
where
    S: SessionStore + 'static,
    G: TextGenerator + 'static,
    N: Notifier + 'static,
{
    pub(crate) fn new(
        user: UserId,
        services: Arc<Services<S, G, N>>,
        event_rx: mpsc::UnboundedReceiver<Envelope>,
        event_tx: EnvelopeSender,
        actors: ActorMap,
    ) -> Self {
        Self {
            user,
            services,
            event_rx,
            event_tx,
            actors,
            in_flight: 0,
            next_ticket: 0,
            current_ticket: None,
        }
    }

    pub async fn run(mut self) {
        tracing::debug!(user_id = %self.user, "Starting user runtime");

        loop {
            let envelope = match self.event_rx.try_recv() {
                Ok(envelope) => envelope,
                Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) if self.in_flight == 0 => {
                    if self.retire().await {
                        break;
                    }
                    continue;
                }
                Err(TryRecvError::Empty) => match self.event_rx.recv().await {
                    Some(envelope) => envelope,
                    None => break,
                },
            };

            let services = self.services.clone();
            let Ok(_permit) = services.pool.acquire().await else {
                break;
            };
            self.process_envelope(envelope).await;
        }

        tracing::debug!(user_id = %self.user, "User runtime stopped");
    }

    /// Leave the actor map if nothing is queued.
    ///
    /// Dispatchers send while holding the map's read lock, so once the write
    /// lock is held no new event can slip into this queue unseen.
    async fn retire(&mut self) -> bool {
        let mut actors = self.actors.write().await;
        if !self.event_rx.is_empty() {
            return false;
        }
        if actors
            .get(&self.user)
            .is_some_and(|tx| tx.same_channel(&self.event_tx))
        {
            actors.remove(&self.user);
        }
        true
    }

    async fn process_envelope(&mut self, envelope: Envelope) {
        let Envelope { event, ticket } = envelope;

        if event.is_generation_outcome() {
            self.in_flight = self.in_flight.saturating_sub(1);
            if ticket.is_none() || ticket != self.current_ticket {
                tracing::info!(user_id = %self.user, "Discarding outcome of a superseded generation");
                return;
            }
            self.current_ticket = None;
        }

        if let Err(e) = self.process_event(event).await {
            self.recover(e).await;
        }
    }

    async fn process_event(&mut self, event: Event) -> Result<(), StoreError> {
        let user = self.user;
        let session = self.services.store.get(user).await?;
        let context = self.turn_context(session.as_ref()).await;

        let result = match transition(session.as_ref(), &context, event) {
            Ok(result) => result,
            Err(TransitionError::Busy) => {
                tracing::info!(user_id = %user, "Generation in progress, ignoring message");
                return Ok(());
            }
            Err(e @ TransitionError::StaleOutcome(_)) => {
                tracing::info!(user_id = %user, reason = %e, "Ignoring generation outcome");
                return Ok(());
            }
        };

        tracing::info!(
            user_id = %user,
            from = session.as_ref().map_or("none", |s| s.step.name()),
            to = result.session.as_ref().map_or("none", |s| s.step.name()),
            effects = result.effects.len(),
            "Transition"
        );

        // Persist before any send, so a retried delivery sees the new step
        match &result.session {
            Some(next) => self.services.store.set(user, next.clone()).await?,
            None => self.services.store.delete(user).await?,
        }

        for effect in result.effects {
            if let Err(e) = self.execute_effect(effect).await {
                tracing::warn!(
                    user_id = %user,
                    error = %e,
                    "Outbound send failed, aborting remaining effects and clearing session"
                );
                self.services.store.delete(user).await?;
                break;
            }
        }

        Ok(())
    }

    /// Localized answer words, only needed once content was delivered
    async fn turn_context(&self, session: Option<&Session>) -> TurnContext {
        let Some(session) = session.filter(|s| matches!(s.step, Step::PostLearn | Step::PostQuiz))
        else {
            return TurnContext::default();
        };
        TurnContext::new(self.keywords(session.language_or_default()).await)
    }

    /// Answer words for `language`, as shown in prompts and as matched
    async fn keywords(&self, language: &str) -> Keywords {
        let phrases = &self.services.phrases;
        Keywords {
            pdf: phrases.resolve(Phrase::PdfWord, language).await,
            quiz: phrases.resolve(Phrase::QuizWord, language).await,
            yes: phrases.resolve(Phrase::YesWord, language).await,
        }
    }

    /// Execute an effect; an error aborts the rest of the turn
    async fn execute_effect(&mut self, effect: Effect) -> Result<(), NotifyError> {
        match effect {
            Effect::Notify(notice) => self.notify(&notice).await,

            Effect::SendChunked { text } => {
                for piece in chunk(&text, self.services.max_message_chars) {
                    self.services.notifier.send_text(self.user, &piece).await?;
                }
                Ok(())
            }

            Effect::Generate { mode, prompt } => {
                self.spawn_generation(mode, prompt);
                Ok(())
            }

            Effect::SendDocument {
                topic,
                notes,
                language,
            } => match self.services.renderer.render(&topic, &notes, &language) {
                Ok(document) => {
                    let caption = fill_topic(
                        &self.services.phrases.resolve(Phrase::DocumentCaption, &language).await,
                        Some(&topic),
                    );
                    tracing::info!(user_id = %self.user, filename = %document.filename, "Sending document");
                    self.services
                        .notifier
                        .send_document(self.user, document, Some(&caption))
                        .await
                }
                Err(e) => {
                    tracing::warn!(user_id = %self.user, %language, error = %e, "Document rendering failed");
                    self.notify(&Notice {
                        phrase: Phrase::PdfFontError,
                        language,
                        topic: None,
                    })
                    .await
                }
            },
        }
    }

    async fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        let template = self.services.phrases.resolve(notice.phrase, &notice.language).await;
        let mut text = fill_topic(&template, notice.topic.as_deref());
        if notice.phrase.names_keywords() {
            text = fill_keywords(&text, &self.keywords(&notice.language).await);
        }
        tracing::debug!(user_id = %self.user, phrase = notice.phrase.key(), "Sending notice");
        self.services.notifier.send_text(self.user, &text).await
    }

    /// Run the generation call as a background task holding a pool permit
    fn spawn_generation(&mut self, mode: Mode, prompt: String) {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.current_ticket = Some(ticket);
        self.in_flight += 1;

        let services = self.services.clone();
        let event_tx = self.event_tx.clone();
        let user = self.user;

        tokio::spawn(async move {
            let event = match services.pool.acquire().await {
                Ok(_permit) => {
                    tracing::info!(user_id = %user, %mode, "Making generation request (background)");
                    match services.generator.generate(&prompt).await {
                        Ok(text) => Event::GenerationComplete { mode, text },
                        Err(e) => {
                            tracing::warn!(user_id = %user, %mode, error = %e, "Generation failed");
                            Event::GenerationFailed {
                                mode,
                                message: e.to_string(),
                            }
                        }
                    }
                }
                Err(_) => Event::GenerationFailed {
                    mode,
                    message: "Worker pool closed".to_string(),
                },
            };
            let _ = event_tx.send(Envelope {
                event,
                ticket: Some(ticket),
            });
        });
    }

    /// Session store failed mid-turn: apologize and drop the session
    async fn recover(&self, error: StoreError) {
        tracing::error!(user_id = %self.user, error = %error, "Session store failed");
        let notice = Notice {
            phrase: Phrase::UnknownError,
            language: DEFAULT_LANGUAGE.to_string(),
            topic: None,
        };
        if let Err(e) = self.notify(&notice).await {
            tracing::warn!(user_id = %self.user, error = %e, "Failed to send error notice");
        }
        if let Err(e) = self.services.store.delete(self.user).await {
            tracing::error!(user_id = %self.user, error = %e, "Failed to clear session");
        }
    }
}
