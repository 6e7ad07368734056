//! Conversation state types

use crate::phrases::Phrase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language assumed when the user has not picked one yet
pub const DEFAULT_LANGUAGE: &str = "English";

/// What the user asked the bot to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Tutor-style explanation of a topic
    Learn,
    /// Multiple-choice quiz on a topic
    Quiz,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Learn => f.write_str("learn"),
            Mode::Quiz => f.write_str("quiz"),
        }
    }
}

/// Conversation step, serialized with a `type` tag so it round-trips through
/// durable storage as a single JSON column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Waiting for a numeric menu selection
    #[default]
    Menu,
    /// Waiting for the free-text topic
    TopicInput { mode: Mode },
    /// Waiting for the language, or generating once `processing` is set
    LanguageInput { mode: Mode },
    /// Explanation delivered; offering a document or a quiz
    PostLearn,
    /// Quiz delivered; offering a document
    PostQuiz,
}

impl Step {
    /// Short name used in log fields
    pub fn name(&self) -> &'static str {
        match self {
            Step::Menu => "menu",
            Step::TopicInput { .. } => "topic_input",
            Step::LanguageInput { .. } => "language_input",
            Step::PostLearn => "post_learn",
            Step::PostQuiz => "post_quiz",
        }
    }
}

/// Per-user conversation snapshot.
///
/// A user with no pending interaction has no session at all; that absence is
/// the implicit idle state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub step: Step,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Last full explanation, kept only until a document is offered
    #[serde(default)]
    pub notes: Option<String>,
    /// Set while a generation call is in flight for this user
    #[serde(default)]
    pub processing: bool,
}

impl Session {
    pub fn at(step: Step) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    pub fn topic_or_default(&self) -> &str {
        self.topic.as_deref().unwrap_or("notes")
    }
}

/// Localized answer words the user may type after a delivery.
///
/// Resolved by the runtime for the session's language before the transition
/// runs, so matching stays a pure string comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keywords {
    pub pdf: String,
    pub quiz: String,
    pub yes: String,
}

impl Keywords {
    pub fn english() -> Self {
        Self {
            pdf: Phrase::PdfWord.english().to_string(),
            quiz: Phrase::QuizWord.english().to_string(),
            yes: Phrase::YesWord.english().to_string(),
        }
    }
}

impl Default for Keywords {
    fn default() -> Self {
        Self::english()
    }
}

/// Read-only inputs to a single transition
#[derive(Debug, Clone, Default)]
pub struct TurnContext {
    pub keywords: Keywords,
}

impl TurnContext {
    pub fn new(keywords: Keywords) -> Self {
        Self { keywords }
    }
}
