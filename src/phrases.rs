//! User-visible phrases
//!
//! The state machine asks for a phrase by key and language; a [`PhraseBook`]
//! decides how that becomes text. [`StaticPhrases`] serves the built-in
//! English table, [`TranslatingPhrases`] translates it through the
//! generation backend and caches the result.

mod translate;

pub use translate::TranslatingPhrases;

use crate::state_machine::Keywords;
use async_trait::async_trait;
use std::sync::Arc;

/// Placeholder substituted with the session topic
pub const TOPIC_PLACEHOLDER: &str = "{topic}";
pub const PDF_WORD_PLACEHOLDER: &str = "{pdf_word}";
pub const QUIZ_WORD_PLACEHOLDER: &str = "{quiz_word}";
pub const YES_WORD_PLACEHOLDER: &str = "{yes_word}";

const PLACEHOLDERS: [&str; 4] = [
    TOPIC_PLACEHOLDER,
    PDF_WORD_PLACEHOLDER,
    QUIZ_WORD_PLACEHOLDER,
    YES_WORD_PLACEHOLDER,
];

/// Every notice the bot can send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phrase {
    Welcome,
    LearnPrompt,
    McqPrompt,
    LanguagePrompt,
    InvalidOption,
    SearchMessage,
    NotesIntro,
    PostLearnPrompt,
    PostQuizPrompt,
    DownloadSuccess,
    DocumentCaption,
    NoNotes,
    QuizMessage,
    QuizIntro,
    QuizError,
    FetchError,
    UnknownError,
    UnknownCommand,
    PdfWord,
    QuizWord,
    YesWord,
    EndConversation,
    PdfFontError,
}

impl Phrase {
    pub const ALL: [Phrase; 23] = [
        Phrase::Welcome,
        Phrase::LearnPrompt,
        Phrase::McqPrompt,
        Phrase::LanguagePrompt,
        Phrase::InvalidOption,
        Phrase::SearchMessage,
        Phrase::NotesIntro,
        Phrase::PostLearnPrompt,
        Phrase::PostQuizPrompt,
        Phrase::DownloadSuccess,
        Phrase::DocumentCaption,
        Phrase::NoNotes,
        Phrase::QuizMessage,
        Phrase::QuizIntro,
        Phrase::QuizError,
        Phrase::FetchError,
        Phrase::UnknownError,
        Phrase::UnknownCommand,
        Phrase::PdfWord,
        Phrase::QuizWord,
        Phrase::YesWord,
        Phrase::EndConversation,
        Phrase::PdfFontError,
    ];

    /// Stable key, used in logs
    pub fn key(self) -> &'static str {
        match self {
            Phrase::Welcome => "welcome",
            Phrase::LearnPrompt => "learn_prompt",
            Phrase::McqPrompt => "mcq_prompt",
            Phrase::LanguagePrompt => "language_prompt",
            Phrase::InvalidOption => "invalid_option",
            Phrase::SearchMessage => "search_message",
            Phrase::NotesIntro => "notes_intro",
            Phrase::PostLearnPrompt => "post_learn_prompt",
            Phrase::PostQuizPrompt => "post_quiz_prompt",
            Phrase::DownloadSuccess => "download_success",
            Phrase::DocumentCaption => "document_caption",
            Phrase::NoNotes => "no_notes",
            Phrase::QuizMessage => "quiz_message",
            Phrase::QuizIntro => "quiz_intro",
            Phrase::QuizError => "quiz_error",
            Phrase::FetchError => "fetch_error",
            Phrase::UnknownError => "unknown_error",
            Phrase::UnknownCommand => "unknown_command",
            Phrase::PdfWord => "pdf_word",
            Phrase::QuizWord => "quiz_word",
            Phrase::YesWord => "yes_word",
            Phrase::EndConversation => "end_conversation",
            Phrase::PdfFontError => "pdf_font_error",
        }
    }

    /// Built-in English text
    pub fn english(self) -> &'static str {
        match self {
            Phrase::Welcome => "Hi! 👋 What would you like help with today?\n\n*Reply with a number:*\n1️⃣ Learn about a topic\n2️⃣ Test your knowledge with MCQs",
            Phrase::LearnPrompt => "📚 What topic would you like to learn about?",
            Phrase::McqPrompt => "📝 What topic would you like a quiz on?",
            Phrase::LanguagePrompt => "Great choice! Now, please tell me the language you want to learn in (e.g., English, Hindi, Spanish).",
            Phrase::InvalidOption => "Please enter a valid option: 1 or 2.",
            Phrase::SearchMessage => "Finding and explaining the topic for you... ⏳",
            Phrase::NotesIntro => "📘 Here's the explanation of '{topic}':",
            Phrase::PostLearnPrompt => "Would you like a downloadable PDF of these notes or a quiz to test your knowledge?\n\nReply with '{pdf_word}' or '{quiz_word}'.",
            Phrase::PostQuizPrompt => "Would you like a downloadable PDF of the notes? Reply with '{yes_word}' to get them.",
            Phrase::DownloadSuccess => "Generating your notes as a PDF... 📄",
            Phrase::DocumentCaption => "Here are your downloadable notes for {topic}!",
            Phrase::NoNotes => "❌ I'm sorry, I couldn't find the notes to download.",
            Phrase::QuizMessage => "Generating an insightful quiz on '{topic}'... 🤔",
            Phrase::QuizIntro => "🧠 Here's your quiz:",
            Phrase::QuizError => "❌ Couldn't generate the MCQs. Try again later.",
            Phrase::FetchError => "❌ Couldn't fetch learning content right now.",
            Phrase::UnknownError => "❌ Sorry, something went wrong. Please try again later.",
            Phrase::UnknownCommand => "I'm not sure what you mean. Please say 'hi edgo' to get the main menu.",
            Phrase::PdfWord => "PDF",
            Phrase::QuizWord => "Quiz",
            Phrase::YesWord => "Yes",
            Phrase::EndConversation => "Okay, let me know if you need anything else! 😊",
            Phrase::PdfFontError => "❌ I couldn't generate the PDF because no font for your language is installed. Please try again later.",
        }
    }

    /// Placeholders the English text carries; a translation must keep them
    pub fn placeholders(self) -> impl Iterator<Item = &'static str> {
        let english = self.english();
        PLACEHOLDERS.into_iter().filter(move |p| english.contains(p))
    }

    /// True when the text names the answer words the next turn matches
    pub fn names_keywords(self) -> bool {
        matches!(self, Phrase::PostLearnPrompt | Phrase::PostQuizPrompt)
    }
}

/// True when `language` needs no translation
pub fn is_english(language: &str) -> bool {
    language.trim().eq_ignore_ascii_case("english")
}

/// Substitute the topic placeholder, if the phrase carries one
pub fn fill_topic(template: &str, topic: Option<&str>) -> String {
    match topic {
        Some(topic) => template.replace(TOPIC_PLACEHOLDER, topic),
        None => template.to_string(),
    }
}

/// Substitute the answer-word placeholders with the words matching accepts
pub fn fill_keywords(template: &str, keywords: &Keywords) -> String {
    template
        .replace(PDF_WORD_PLACEHOLDER, &keywords.pdf)
        .replace(QUIZ_WORD_PLACEHOLDER, &keywords.quiz)
        .replace(YES_WORD_PLACEHOLDER, &keywords.yes)
}

/// Resolves a phrase key into text for a language
#[async_trait]
pub trait PhraseBook: Send + Sync {
    /// Never fails: implementations fall back to English
    async fn resolve(&self, phrase: Phrase, language: &str) -> String;
}

#[async_trait]
impl<T: PhraseBook + ?Sized> PhraseBook for Arc<T> {
    async fn resolve(&self, phrase: Phrase, language: &str) -> String {
        (**self).resolve(phrase, language).await
    }
}

/// English-only phrase table
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPhrases;

#[async_trait]
impl PhraseBook for StaticPhrases {
    async fn resolve(&self, phrase: Phrase, _language: &str) -> String {
        phrase.english().to_string()
    }
}
