//! Pure state transition function
//!
//! One `match` over `(step, event)` decides the next snapshot and the ordered
//! effects. Returning `session: None` deletes the session: the user is back
//! in the implicit idle state and must send a greeting to start over.

use super::state::DEFAULT_LANGUAGE;
use super::{Effect, Event, Keywords, Mode, Session, Step, TurnContext};
use crate::chunker::format_bullets;
use crate::phrases::Phrase;
use crate::prompts::build_prompt;
use thiserror::Error;

/// Messages that reset any conversation to the menu
pub const GREETING_TRIGGERS: &[&str] = &["/start", "hi edgo"];

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    /// Next snapshot; `None` ends the conversation
    pub session: Option<Session>,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(session: Session) -> Self {
        Self {
            session: Some(session),
            effects: vec![],
        }
    }

    pub fn end() -> Self {
        Self {
            session: None,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events the current snapshot cannot accept
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Generation already in progress, message ignored")]
    Busy,
    #[error("No {0} generation is awaited, outcome discarded")]
    StaleOutcome(Mode),
}

pub fn is_greeting(text: &str) -> bool {
    let text = text.trim();
    GREETING_TRIGGERS
        .iter()
        .any(|trigger| text.eq_ignore_ascii_case(trigger))
}

/// Trimmed, first letter upper-case, rest lower-case
pub fn normalize_language(text: &str) -> String {
    let mut chars = text.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Pure transition function
///
/// Given the same snapshot, context, and event it always produces the same
/// result, with no I/O.
pub fn transition(
    session: Option<&Session>,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (session, event) {
        // Global interrupt: the greeting resets whatever was in progress
        (_, Event::UserMessage { text }) if is_greeting(&text) => {
            Ok(TransitionResult::new(Session::at(Step::Menu))
                .with_effect(Effect::notify(Phrase::Welcome, DEFAULT_LANGUAGE)))
        }

        (None, Event::UserMessage { .. }) => Ok(TransitionResult::end()
            .with_effect(Effect::notify(Phrase::UnknownCommand, DEFAULT_LANGUAGE))),

        // Duplicate guard
        (Some(s), Event::UserMessage { .. }) if s.processing => Err(TransitionError::Busy),

        (Some(s), Event::UserMessage { text }) => Ok(on_user_message(s, &context.keywords, text.trim())),

        // Blank output counts as a failed generation
        (Some(s), Event::GenerationComplete { mode, text }) if awaits(s, mode) => {
            Ok(if text.trim().is_empty() {
                on_generation_failed(s, mode)
            } else {
                on_generation_complete(s, mode, &text)
            })
        }

        (Some(s), Event::GenerationFailed { mode, .. }) if awaits(s, mode) => {
            Ok(on_generation_failed(s, mode))
        }

        (_, Event::GenerationComplete { mode, .. } | Event::GenerationFailed { mode, .. }) => {
            Err(TransitionError::StaleOutcome(mode))
        }
    }
}

fn awaits(session: &Session, mode: Mode) -> bool {
    session.processing && session.step == Step::LanguageInput { mode }
}

fn on_user_message(session: &Session, keywords: &Keywords, text: &str) -> TransitionResult {
    let language = session.language_or_default();

    match session.step {
        Step::Menu => match text {
            "1" => TransitionResult::new(Session::at(Step::TopicInput { mode: Mode::Learn }))
                .with_effect(Effect::notify(Phrase::LearnPrompt, DEFAULT_LANGUAGE)),
            "2" => TransitionResult::new(Session::at(Step::TopicInput { mode: Mode::Quiz }))
                .with_effect(Effect::notify(Phrase::McqPrompt, DEFAULT_LANGUAGE)),
            _ => TransitionResult::new(session.clone())
                .with_effect(Effect::notify(Phrase::InvalidOption, DEFAULT_LANGUAGE)),
        },

        Step::TopicInput { mode } if text.is_empty() => {
            let prompt = match mode {
                Mode::Learn => Phrase::LearnPrompt,
                Mode::Quiz => Phrase::McqPrompt,
            };
            TransitionResult::new(session.clone()).with_effect(Effect::notify(prompt, DEFAULT_LANGUAGE))
        }

        Step::TopicInput { mode } => TransitionResult::new(Session {
            step: Step::LanguageInput { mode },
            topic: Some(text.to_string()),
            ..session.clone()
        })
        .with_effect(Effect::notify(Phrase::LanguagePrompt, DEFAULT_LANGUAGE)),

        Step::LanguageInput { .. } if normalize_language(text).is_empty() => {
            TransitionResult::new(session.clone())
                .with_effect(Effect::notify(Phrase::LanguagePrompt, DEFAULT_LANGUAGE))
        }

        Step::LanguageInput { mode } => {
            let next = Session {
                language: Some(normalize_language(text)),
                ..session.clone()
            };
            begin_generation(next, mode)
        }

        Step::PostLearn => {
            if matches_keyword(text, &keywords.pdf, "pdf") {
                deliver_notes(session).unwrap_or_else(|| {
                    TransitionResult::end().with_effect(Effect::notify(Phrase::NoNotes, language))
                })
            } else if matches_keyword(text, &keywords.quiz, "quiz") {
                begin_generation(session.clone(), Mode::Quiz)
            } else {
                TransitionResult::end().with_effect(Effect::notify(Phrase::UnknownCommand, language))
            }
        }

        Step::PostQuiz => {
            if matches_keyword(text, &keywords.yes, "yes") {
                deliver_notes(session).unwrap_or_else(|| {
                    TransitionResult::end().with_effect(Effect::notify(Phrase::NoNotes, language))
                })
            } else {
                TransitionResult::end().with_effect(Effect::notify(Phrase::EndConversation, language))
            }
        }
    }
}

/// Mark the session busy and request generation for `mode`
fn begin_generation(session: Session, mode: Mode) -> TransitionResult {
    let language = session.language_or_default().to_string();
    let topic = session.topic_or_default().to_string();
    let progress = match mode {
        Mode::Learn => Effect::notify(Phrase::SearchMessage, language.clone()),
        Mode::Quiz => Effect::notify_about(Phrase::QuizMessage, language.clone(), topic.clone()),
    };
    let prompt = build_prompt(mode, &topic, &language);

    TransitionResult::new(Session {
        step: Step::LanguageInput { mode },
        processing: true,
        ..session
    })
    .with_effect(progress)
    .with_effect(Effect::Generate { mode, prompt })
}

fn on_generation_complete(session: &Session, mode: Mode, text: &str) -> TransitionResult {
    let language = session.language_or_default().to_string();
    let topic = session.topic_or_default().to_string();
    let body = Effect::SendChunked {
        text: format_bullets(text),
    };

    match mode {
        Mode::Learn => TransitionResult::new(Session {
            step: Step::PostLearn,
            notes: Some(text.to_string()),
            processing: false,
            ..session.clone()
        })
        .with_effects([
            Effect::notify_about(Phrase::NotesIntro, language.clone(), topic),
            body,
            Effect::notify(Phrase::PostLearnPrompt, language),
        ]),
        Mode::Quiz => TransitionResult::new(Session {
            step: Step::PostQuiz,
            processing: false,
            ..session.clone()
        })
        .with_effects([
            Effect::notify(Phrase::QuizIntro, language.clone()),
            body,
            Effect::notify(Phrase::PostQuizPrompt, language),
        ]),
    }
}

fn on_generation_failed(session: &Session, mode: Mode) -> TransitionResult {
    let phrase = match mode {
        Mode::Learn => Phrase::FetchError,
        Mode::Quiz => Phrase::QuizError,
    };
    TransitionResult::end().with_effect(Effect::notify(phrase, session.language_or_default()))
}

/// Document effects for stored notes; `None` when there are none
fn deliver_notes(session: &Session) -> Option<TransitionResult> {
    let notes = session.notes.as_deref().filter(|n| !n.trim().is_empty())?;
    let language = session.language_or_default().to_string();
    Some(TransitionResult::end().with_effects([
        Effect::notify(Phrase::DownloadSuccess, language.clone()),
        Effect::SendDocument {
            topic: session.topic_or_default().to_string(),
            notes: notes.to_string(),
            language,
        },
    ]))
}

/// Case-insensitive match against the localized word or its English literal
fn matches_keyword(input: &str, localized: &str, literal: &str) -> bool {
    let input = input.trim().to_lowercase();
    input == localized.trim().to_lowercase() || input == literal
}
