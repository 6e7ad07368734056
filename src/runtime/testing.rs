//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use super::{RuntimeManager, RuntimeSettings};
use crate::db::DbError;
use crate::document::{Document, PdfRenderer};
use crate::llm::{GenerationError, TextGenerator};
use crate::phrases::{fill_keywords, Phrase, PhraseBook, StaticPhrases};
use crate::session::{MemorySessionStore, SessionPatch, SessionStore, StoreError, UserId};
use crate::state_machine::{Event, Keywords, Session};
use crate::telegram::NotifyError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Generator
// ============================================================================

/// Mock generator that returns queued results
#[allow(dead_code)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    delay: Duration,
    /// Record of all prompts received
    pub prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockGenerator {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Each call sleeps before answering (for in-flight testing)
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            delay,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn queue_text(&self, text: &str) {
        self.responses.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn queue_failure(&self, message: &str) {
        let last = GenerationError::rate_limit(message);
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(GenerationError::exhausted(3, &last)));
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GenerationError::transport("No mock response queued")))
    }
}

// ============================================================================
// Mock Notifier
// ============================================================================

/// One recorded outbound send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        user: UserId,
        text: String,
    },
    Document {
        user: UserId,
        filename: String,
        caption: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Mock notifier that records sends and can fail on a chosen attempt
#[allow(dead_code)]
pub struct MockNotifier {
    sent: Mutex<Vec<Sent>>,
    attempts: AtomicUsize,
    fail_at: Mutex<Option<usize>>,
}

#[allow(dead_code)]
impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_at: Mutex::new(None),
        }
    }

    /// Fail the send attempt with this zero-based index
    pub fn fail_on_attempt(&self, index: usize) {
        *self.fail_at.lock().unwrap() = Some(index);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts sent to `user`, in order
    pub fn texts(&self, user: UserId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { user: u, text } if *u == user => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn documents(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| matches!(s, Sent::Document { .. }))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn attempt(&self) -> Result<(), NotifyError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.fail_at.lock().unwrap() == Some(n) {
            return Err(NotifyError::Timeout("mock send timed out".to_string()));
        }
        Ok(())
    }
}

impl Default for MockNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send_text(&self, user: UserId, text: &str) -> Result<(), NotifyError> {
        self.attempt()?;
        self.sent.lock().unwrap().push(Sent::Text {
            user,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_document(
        &self,
        user: UserId,
        document: Document,
        caption: Option<&str>,
    ) -> Result<(), NotifyError> {
        self.attempt()?;
        self.sent.lock().unwrap().push(Sent::Document {
            user,
            filename: document.filename,
            caption: caption.map(String::from),
            bytes: document.bytes,
        });
        Ok(())
    }
}

// ============================================================================
// Mock Phrases and Store
// ============================================================================

/// English phrases with per-language overrides
#[derive(Default)]
pub struct MockPhrases {
    overrides: HashMap<(Phrase, String), String>,
}

impl MockPhrases {
    pub fn with(mut self, phrase: Phrase, language: &str, text: &str) -> Self {
        self.overrides
            .insert((phrase, language.to_string()), text.to_string());
        self
    }
}

#[async_trait]
impl PhraseBook for MockPhrases {
    async fn resolve(&self, phrase: Phrase, language: &str) -> String {
        self.overrides
            .get(&(phrase, language.to_string()))
            .cloned()
            .unwrap_or_else(|| phrase.english().to_string())
    }
}

/// English text of `phrase` as the runtime sends it
pub fn shown(phrase: Phrase) -> String {
    fill_keywords(phrase.english(), &Keywords::english())
}

/// Memory store whose reads can be switched to fail
#[derive(Default)]
pub struct FlakyStore {
    inner: MemorySessionStore,
    pub fail_reads: AtomicBool,
}

impl FlakyStore {
    fn check(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Database(DbError::Sqlite(rusqlite::Error::InvalidQuery)));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn get(&self, user: UserId) -> Result<Option<Session>, StoreError> {
        self.check()?;
        self.inner.get(user).await
    }

    async fn set(&self, user: UserId, session: Session) -> Result<(), StoreError> {
        self.inner.set(user, session).await
    }

    async fn update(&self, user: UserId, patch: SessionPatch) -> Result<Session, StoreError> {
        self.inner.update(user, patch).await
    }

    async fn delete(&self, user: UserId) -> Result<(), StoreError> {
        self.inner.delete(user).await
    }
}

// ============================================================================
// Test Harness
// ============================================================================

type TestManager<S> = RuntimeManager<Arc<S>, Arc<MockGenerator>, Arc<MockNotifier>>;

/// Runtime wired to mocks, with helpers to drive one or more users
pub struct TestHarness<S: SessionStore + 'static = MemorySessionStore> {
    pub manager: TestManager<S>,
    pub store: Arc<S>,
    pub generator: Arc<MockGenerator>,
    pub notifier: Arc<MockNotifier>,
}

impl TestHarness<MemorySessionStore> {
    pub fn new() -> Self {
        Self::build(
            MemorySessionStore::new(),
            MockGenerator::new(),
            Arc::new(StaticPhrases),
            4096,
        )
    }

    pub fn with_generator(generator: MockGenerator) -> Self {
        Self::build(MemorySessionStore::new(), generator, Arc::new(StaticPhrases), 4096)
    }
}

impl<S: SessionStore + 'static> TestHarness<S> {
    pub fn build(
        store: S,
        generator: MockGenerator,
        phrases: Arc<dyn PhraseBook>,
        max_message_chars: usize,
    ) -> Self {
        let store = Arc::new(store);
        let generator = Arc::new(generator);
        let notifier = Arc::new(MockNotifier::new());
        let manager = RuntimeManager::new(
            store.clone(),
            generator.clone(),
            notifier.clone(),
            phrases,
            Arc::new(PdfRenderer::new()),
            RuntimeSettings {
                max_message_chars,
                worker_concurrency: 4,
            },
        );
        Self {
            manager,
            store,
            generator,
            notifier,
        }
    }

    /// Dispatch without waiting
    pub async fn send(&self, user: UserId, text: &str) {
        self.manager.send_event(user, Event::user_message(text)).await;
    }

    /// Dispatch and wait until every actor has gone idle
    pub async fn send_and_settle(&self, user: UserId, text: &str) {
        self.send(user, text).await;
        assert!(self.settle(Duration::from_secs(5)).await, "runtime did not settle");
    }

    /// Wait until no actor is running
    pub async fn settle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.manager.active_users().await == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        false
    }

    pub async fn session(&self, user: UserId) -> Option<Session> {
        self.store.get(user).await.unwrap()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::{Mode, Step};

    const USER: UserId = UserId(1001);
    const EXPLANATION: &str = "* Plants capture light\n* Chlorophyll is green";

    async fn reach_post_learn(harness: &TestHarness) {
        harness.generator.queue_text(EXPLANATION);
        for text in ["hi edgo", "1", "Photosynthesis", "English"] {
            harness.send_and_settle(USER, text).await;
        }
    }

    #[tokio::test]
    async fn test_mock_generator() {
        let mock = MockGenerator::new();
        mock.queue_text("hello");
        assert_eq!(mock.generate("p").await.unwrap(), "hello");
        assert!(mock.generate("q").await.is_err());
        assert_eq!(mock.prompts(), vec!["p", "q"]);
    }

    #[tokio::test]
    async fn test_mock_notifier_failure() {
        let mock = MockNotifier::new();
        mock.fail_on_attempt(1);
        assert!(mock.send_text(USER, "a").await.is_ok());
        assert!(mock.send_text(USER, "b").await.is_err());
        assert!(mock.send_text(USER, "c").await.is_ok());
        assert_eq!(mock.texts(USER), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_learn_flow_delivers_explanation() {
        let harness = TestHarness::new();

        harness.send_and_settle(USER, "hi edgo").await;
        assert_eq!(harness.notifier.texts(USER), vec![Phrase::Welcome.english()]);

        harness.send_and_settle(USER, "1").await;
        harness.send_and_settle(USER, "Photosynthesis").await;
        assert_eq!(
            harness.notifier.texts(USER)[1..],
            [Phrase::LearnPrompt.english(), Phrase::LanguagePrompt.english()]
        );

        harness.generator.queue_text(EXPLANATION);
        harness.send_and_settle(USER, "english").await;

        let texts = harness.notifier.texts(USER);
        assert_eq!(
            texts[3..],
            [
                Phrase::SearchMessage.english().to_string(),
                "📘 Here's the explanation of 'Photosynthesis':".to_string(),
                "➤ Plants capture light\n➤ Chlorophyll is green".to_string(),
                shown(Phrase::PostLearnPrompt),
            ]
        );

        let session = harness.session(USER).await.unwrap();
        assert_eq!(session.step, Step::PostLearn);
        assert_eq!(session.language.as_deref(), Some("English"));
        assert_eq!(session.notes.as_deref(), Some(EXPLANATION));
        assert!(!session.processing);

        let prompts = harness.generator.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Topic: Photosynthesis"));
    }

    #[tokio::test]
    async fn test_pdf_request_sends_document_and_clears_session() {
        let harness = TestHarness::new();
        reach_post_learn(&harness).await;
        harness.notifier.clear();

        harness.send_and_settle(USER, "PDF").await;

        let sent = harness.notifier.sent();
        assert_eq!(
            sent[0],
            Sent::Text {
                user: USER,
                text: Phrase::DownloadSuccess.english().to_string()
            }
        );
        match &sent[1] {
            Sent::Document {
                filename,
                caption,
                bytes,
                ..
            } => {
                assert_eq!(filename, "Photosynthesis_notes.pdf");
                assert!(caption.as_deref().unwrap().contains("Photosynthesis"));
                assert!(bytes.starts_with(b"%PDF"));
            }
            other => panic!("expected a document, got {other:?}"),
        }
        assert!(harness.session(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_quiz_after_learn_reuses_topic() {
        let harness = TestHarness::new();
        reach_post_learn(&harness).await;

        harness.generator.queue_text("Q1. What is chlorophyll?");
        harness.send_and_settle(USER, "quiz").await;

        let texts = harness.notifier.texts(USER);
        assert!(texts.contains(&"Generating an insightful quiz on 'Photosynthesis'... 🤔".to_string()));
        assert!(texts.contains(&"Q1. What is chlorophyll?".to_string()));
        assert_eq!(*texts.last().unwrap(), shown(Phrase::PostQuizPrompt));
        assert_eq!(harness.session(USER).await.unwrap().step, Step::PostQuiz);

        // Notes from the explanation are still offered after the quiz
        harness.send_and_settle(USER, "yes").await;
        assert_eq!(harness.notifier.documents().len(), 1);
        assert!(harness.session(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_failed_generation_clears_session() {
        let harness = TestHarness::new();
        harness.generator.queue_failure("Rate limit exceeded");

        for text in ["hi edgo", "2", "Algebra", "English"] {
            harness.send_and_settle(USER, text).await;
        }

        let texts = harness.notifier.texts(USER);
        assert_eq!(
            texts[texts.len() - 2..],
            [
                "Generating an insightful quiz on 'Algebra'... 🤔".to_string(),
                Phrase::QuizError.english().to_string(),
            ]
        );
        assert!(harness.session(USER).await.is_none());

        // Back to the implicit idle state: only the greeting restarts
        harness.send_and_settle(USER, "Geometry").await;
        assert_eq!(
            harness.notifier.texts(USER).last().unwrap(),
            Phrase::UnknownCommand.english()
        );
        assert!(harness.session(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_blank_generation_is_a_failure() {
        let harness = TestHarness::new();
        harness.generator.queue_text("   ");

        for text in ["hi edgo", "1", "Photosynthesis", "English"] {
            harness.send_and_settle(USER, text).await;
        }

        let texts = harness.notifier.texts(USER);
        assert_eq!(
            texts[texts.len() - 2..],
            [
                Phrase::SearchMessage.english().to_string(),
                Phrase::FetchError.english().to_string(),
            ]
        );
        assert!(!texts.contains(&shown(Phrase::PostLearnPrompt)));
        assert!(harness.session(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_translated_prompt_names_the_matched_word() {
        let phrases = MockPhrases::default()
            .with(Phrase::PdfWord, "Hindi", "पीडीएफ")
            .with(Phrase::QuizWord, "Hindi", "क्विज़")
            .with(
                Phrase::PostLearnPrompt,
                "Hindi",
                "क्या आप नोट्स चाहते हैं? '{pdf_word}' या '{quiz_word}' लिखें।",
            );
        let harness = TestHarness::build(MemorySessionStore::new(), MockGenerator::new(), Arc::new(phrases), 4096);
        harness.generator.queue_text(EXPLANATION);
        for text in ["hi edgo", "1", "Photosynthesis", "Hindi"] {
            harness.send_and_settle(USER, text).await;
        }

        let prompt = harness.notifier.texts(USER).last().unwrap().clone();
        assert_eq!(prompt, "क्या आप नोट्स चाहते हैं? 'पीडीएफ' या 'क्विज़' लिखें।");

        // The word the prompt showed is the word the next turn accepts
        harness.generator.queue_text("Q1. क्लोरोफिल क्या है?");
        harness.send_and_settle(USER, "क्विज़").await;
        assert_eq!(harness.generator.call_count(), 2);
        assert_eq!(harness.session(USER).await.unwrap().step, Step::PostQuiz);
    }

    #[tokio::test]
    async fn test_duplicate_language_submission_generates_once() {
        let harness = TestHarness::with_generator(MockGenerator::with_delay(Duration::from_millis(100)));
        harness.generator.queue_text(EXPLANATION);
        for text in ["hi edgo", "1", "Photosynthesis"] {
            harness.send_and_settle(USER, text).await;
        }

        harness.send(USER, "English").await;
        harness.send(USER, "English").await;
        assert!(harness.settle(Duration::from_secs(5)).await);

        assert_eq!(harness.generator.call_count(), 1);
        let texts = harness.notifier.texts(USER);
        let searches = texts
            .iter()
            .filter(|t| *t == Phrase::SearchMessage.english())
            .count();
        assert_eq!(searches, 1);
        assert_eq!(harness.session(USER).await.unwrap().step, Step::PostLearn);
    }

    #[tokio::test]
    async fn test_messages_apply_in_dispatch_order() {
        let harness = TestHarness::new();
        for text in ["hi edgo", "2", "Algebra"] {
            harness.send(USER, text).await;
        }
        assert!(harness.settle(Duration::from_secs(5)).await);

        let session = harness.session(USER).await.unwrap();
        assert_eq!(session.step, Step::LanguageInput { mode: Mode::Quiz });
        assert_eq!(session.topic.as_deref(), Some("Algebra"));
    }

    #[tokio::test]
    async fn test_users_progress_independently() {
        let harness = TestHarness::new();
        let other = UserId(2002);

        harness.send(USER, "hi edgo").await;
        harness.send(other, "/start").await;
        harness.send(USER, "1").await;
        harness.send(other, "2").await;
        assert!(harness.settle(Duration::from_secs(5)).await);

        assert_eq!(
            harness.session(USER).await.unwrap().step,
            Step::TopicInput { mode: Mode::Learn }
        );
        assert_eq!(
            harness.session(other).await.unwrap().step,
            Step::TopicInput { mode: Mode::Quiz }
        );
    }

    #[tokio::test]
    async fn test_send_failure_aborts_turn_and_clears_session() {
        let harness = TestHarness::new();
        harness.generator.queue_text(EXPLANATION);
        for text in ["hi edgo", "1", "Photosynthesis"] {
            harness.send_and_settle(USER, text).await;
        }
        // Attempts so far: welcome, learn prompt, language prompt.
        // Fail the notes intro, right after the search notice.
        harness.notifier.fail_on_attempt(4);
        harness.send_and_settle(USER, "English").await;

        let texts = harness.notifier.texts(USER);
        assert_eq!(texts.last().unwrap(), Phrase::SearchMessage.english());
        assert!(harness.session(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_greeting_supersedes_running_generation() {
        let harness = TestHarness::with_generator(MockGenerator::with_delay(Duration::from_millis(100)));
        harness.generator.queue_text(EXPLANATION);
        for text in ["hi edgo", "1", "Photosynthesis", "English"] {
            harness.send(USER, text).await;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        harness.send(USER, "hi edgo").await;
        assert!(harness.settle(Duration::from_secs(5)).await);

        assert_eq!(harness.session(USER).await, Some(Session::at(Step::Menu)));
        let texts = harness.notifier.texts(USER);
        assert_eq!(texts.last().unwrap(), Phrase::Welcome.english());
        assert!(!texts.contains(&shown(Phrase::PostLearnPrompt)));
    }

    #[tokio::test]
    async fn test_long_output_is_chunked() {
        let harness = TestHarness::build(
            MemorySessionStore::new(),
            MockGenerator::new(),
            Arc::new(StaticPhrases),
            40,
        );
        let long = "Photosynthesis converts light energy into chemical energy stored in glucose molecules";
        harness.generator.queue_text(long);
        for text in ["hi edgo", "1", "Photosynthesis", "English"] {
            harness.send_and_settle(USER, text).await;
        }

        let texts = harness.notifier.texts(USER);
        let start = texts
            .iter()
            .position(|t| t.starts_with("📘"))
            .unwrap()
            + 1;
        let end = texts.len() - 1;
        let body = &texts[start..end];
        assert!(body.len() > 1);
        assert!(body.iter().all(|c| c.chars().count() <= 40));
        assert_eq!(body.join(" "), long);
    }

    #[tokio::test]
    async fn test_localized_keyword_and_caption() {
        let phrases = MockPhrases::default()
            .with(Phrase::YesWord, "Spanish", "sí")
            .with(Phrase::DocumentCaption, "Spanish", "¡Aquí están tus notas de {topic}!");
        let harness = TestHarness::build(MemorySessionStore::new(), MockGenerator::new(), Arc::new(phrases), 4096);
        harness
            .store
            .set(
                USER,
                Session {
                    step: Step::PostQuiz,
                    topic: Some("Fotosíntesis".to_string()),
                    language: Some("Spanish".to_string()),
                    notes: Some("* La luz".to_string()),
                    processing: false,
                },
            )
            .await
            .unwrap();

        harness.send_and_settle(USER, "Sí").await;

        match harness.notifier.documents().first() {
            Some(Sent::Document { caption, filename, .. }) => {
                assert_eq!(caption.as_deref(), Some("¡Aquí están tus notas de Fotosíntesis!"));
                assert_eq!(filename, "Fotosíntesis_notes.pdf");
            }
            other => panic!("expected a document, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrenderable_notes_send_font_error() {
        let harness = TestHarness::new();
        harness
            .store
            .set(
                USER,
                Session {
                    step: Step::PostLearn,
                    topic: Some("Prakash".to_string()),
                    language: Some("Hindi".to_string()),
                    notes: Some("प्रकाश संश्लेषण".to_string()),
                    processing: false,
                },
            )
            .await
            .unwrap();

        harness.send_and_settle(USER, "pdf").await;

        assert!(harness.notifier.documents().is_empty());
        assert_eq!(
            harness.notifier.texts(USER),
            vec![
                Phrase::DownloadSuccess.english(),
                Phrase::PdfFontError.english()
            ]
        );
        assert!(harness.session(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_sends_unknown_error() {
        let harness = TestHarness::build(
            FlakyStore::default(),
            MockGenerator::new(),
            Arc::new(StaticPhrases),
            4096,
        );
        harness.send_and_settle(USER, "hi edgo").await;
        harness.store.fail_reads.store(true, Ordering::SeqCst);

        harness.send_and_settle(USER, "1").await;

        assert_eq!(
            harness.notifier.texts(USER).last().unwrap(),
            Phrase::UnknownError.english()
        );
        harness.store.fail_reads.store(false, Ordering::SeqCst);
        assert!(harness.session(USER).await.is_none());
    }

    #[tokio::test]
    async fn test_actor_retires_when_idle() {
        let harness = TestHarness::new();
        harness.send(USER, "hi edgo").await;
        assert!(harness.manager.active_users().await <= 1);
        assert!(harness.settle(Duration::from_secs(5)).await);

        // A later message starts a fresh actor that sees the stored session
        harness.send_and_settle(USER, "2").await;
        assert_eq!(
            harness.session(USER).await.unwrap().step,
            Step::TopicInput { mode: Mode::Quiz }
        );
    }
}
