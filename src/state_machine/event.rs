//! Events that can occur in a conversation

use super::state::Mode;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    /// Inbound chat text (already trimmed by the dispatcher)
    UserMessage { text: String },

    /// Generation call finished with text
    GenerationComplete { mode: Mode, text: String },

    /// Generation call failed after the client's own retries
    GenerationFailed { mode: Mode, message: String },
}

impl Event {
    pub fn user_message(text: impl Into<String>) -> Self {
        Event::UserMessage { text: text.into() }
    }

    /// True for the events that settle an in-flight generation
    pub fn is_generation_outcome(&self) -> bool {
        matches!(
            self,
            Event::GenerationComplete { .. } | Event::GenerationFailed { .. }
        )
    }
}
