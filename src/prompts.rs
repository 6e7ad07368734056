//! Generation prompt construction
//!
//! Builds the learn and quiz prompts sent to the generation backend, plus the
//! translation prompt used by the translating phrase book.

use crate::state_machine::Mode;
use std::fmt::Write;

/// Role preamble for explanation requests
const TUTOR_PREAMBLE: &str = "Act as a friendly and knowledgeable tutor for all educational topics. \
Your goal is to simplify and explain the following topic for a student in a simple and clear manner:";

/// Sections appended after the main explanation
const RESOURCE_SECTIONS: &str = "After the main explanation, provide two sections:\n\
1. **Explore More** with links to relevant websites for deeper learning.\n\
2. **Watch and Learn** with links to relevant YouTube videos.";

/// Build the prompt for `mode` about `topic`, answered in `language`
pub fn build_prompt(mode: Mode, topic: &str, language: &str) -> String {
    match mode {
        Mode::Learn => build_learn_prompt(topic, language),
        Mode::Quiz => build_quiz_prompt(topic, language),
    }
}

fn build_learn_prompt(topic: &str, language: &str) -> String {
    let mut prompt = String::from(TUTOR_PREAMBLE);
    let _ = write!(prompt, "\n\nTopic: {topic}\n\n");
    let _ = write!(
        prompt,
        "Please provide a detailed explanation in {language} in simple language using **Markdown bullet points**. "
    );
    prompt.push_str(RESOURCE_SECTIONS);
    prompt
}

fn build_quiz_prompt(topic: &str, language: &str) -> String {
    format!(
        "Create 5 challenging and insightful multiple-choice questions (MCQs) on the topic: '{topic}' in {language}.\n\
         For each question, provide 4 options (A, B, C, D).\n\
         Directly after each question, provide the correct answer and a brief, 1-2 line explanation of why it is correct.\n\
         Use Markdown to format the questions and answers clearly."
    )
}

/// Prompt asking for a bare translation of a UI phrase.
///
/// Placeholders such as `{topic}` must survive translation untouched so the
/// runtime can substitute it afterwards.
pub fn build_translation_prompt(text: &str, language: &str) -> String {
    format!(
        "Translate the following chat message into {language}. \
         Keep emoji, Markdown and line breaks. Copy every placeholder in braces, such as {{topic}} or {{pdf_word}}, \
         exactly as written. \
         Reply with the translation only, no quotes or commentary.\n\n{text}"
    )
}
