//! Effects produced by state transitions

use super::state::Mode;
use crate::phrases::Phrase;

/// A user-visible notice, resolved to text by the runtime's phrase book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub phrase: Phrase,
    pub language: String,
    /// Substituted for `{topic}` in the resolved phrase
    pub topic: Option<String>,
}

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send one notice as a single message
    Notify(Notice),

    /// Send a long body split into transport-sized chunks
    SendChunked { text: String },

    /// Issue a generation call; the outcome re-enters as an event
    Generate { mode: Mode, prompt: String },

    /// Render notes into a document and send it with a caption
    SendDocument {
        topic: String,
        notes: String,
        language: String,
    },
}

impl Effect {
    pub fn notify(phrase: Phrase, language: impl Into<String>) -> Self {
        Effect::Notify(Notice {
            phrase,
            language: language.into(),
            topic: None,
        })
    }

    pub fn notify_about(phrase: Phrase, language: impl Into<String>, topic: impl Into<String>) -> Self {
        Effect::Notify(Notice {
            phrase,
            language: language.into(),
            topic: Some(topic.into()),
        })
    }

    /// The phrase carried by a `Notify` effect, if any
    pub fn phrase(&self) -> Option<Phrase> {
        match self {
            Effect::Notify(notice) => Some(notice.phrase),
            _ => None,
        }
    }
}
