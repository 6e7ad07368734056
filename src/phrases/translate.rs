//! Phrase book backed by generated translations

use super::{is_english, Phrase, PhraseBook};
use crate::llm::TextGenerator;
use crate::prompts::build_translation_prompt;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Distinct languages kept in the cache; later ones are served in English
pub const MAX_CACHED_LANGUAGES: usize = 64;

/// `None` records a failed translation
type LanguageCache = HashMap<Phrase, Option<String>>;

/// Translates English phrases on first use per language and caches them.
///
/// Every outcome is cached, failures included, so a phrase resolves to the
/// same text for the life of the process. The prompt that names an answer
/// word and the matching of that word therefore always agree.
pub struct TranslatingPhrases {
    generator: Arc<dyn TextGenerator>,
    cache: RwLock<HashMap<String, LanguageCache>>,
}

impl TranslatingPhrases {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn translate(&self, phrase: Phrase, language: &str) -> Option<String> {
        let prompt = build_translation_prompt(phrase.english(), language);
        match self.generator.generate(&prompt).await {
            Ok(text) => {
                let text = text.trim().trim_matches('"').trim().to_string();
                if text.is_empty() {
                    return None;
                }
                // A lost placeholder would drop the topic or answer word
                if let Some(lost) = phrase.placeholders().find(|p| !text.contains(p)) {
                    tracing::warn!(phrase = phrase.key(), %language, placeholder = lost, "Translation dropped placeholder");
                    return None;
                }
                Some(text)
            }
            Err(e) => {
                tracing::warn!(phrase = phrase.key(), %language, error = %e, "Translation failed");
                None
            }
        }
    }

    /// Whether `language` has, or may still get, a cache entry
    fn admits(cache: &HashMap<String, LanguageCache>, language: &str) -> bool {
        cache.contains_key(language) || cache.len() < MAX_CACHED_LANGUAGES
    }
}

#[async_trait]
impl PhraseBook for TranslatingPhrases {
    async fn resolve(&self, phrase: Phrase, language: &str) -> String {
        let english = || phrase.english().to_string();
        if is_english(language) {
            return english();
        }

        let key = language.trim().to_lowercase();
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(&key).and_then(|phrases| phrases.get(&phrase)) {
                return cached.clone().unwrap_or_else(english);
            }
            if !Self::admits(&cache, &key) {
                tracing::debug!(%language, "Translation cache full, using English");
                return english();
            }
        }

        let translated = self.translate(phrase, language.trim()).await;

        let mut cache = self.cache.write().await;
        if !Self::admits(&cache, &key) {
            return english();
        }
        // A concurrent resolve may have stored its result first; keep that one
        cache
            .entry(key)
            .or_default()
            .entry(phrase)
            .or_insert(translated)
            .clone()
            .unwrap_or_else(english)
    }
}
