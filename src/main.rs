//! Edgo - conversational learning bot for Telegram
//!
//! Receives Telegram webhooks, walks each user through a small menu-driven
//! state machine, and answers with Gemini-generated explanations, quizzes,
//! and PDF notes.

mod api;
mod chunker;
mod config;
mod db;
mod document;
mod llm;
mod phrases;
mod prompts;
mod runtime;
mod session;
mod state_machine;
mod telegram;

use api::{create_router, AppState};
use config::Config;
use db::Database;
use document::PdfRenderer;
use llm::{GeminiBackend, RetryPolicy, RetryingGenerator, TextGenerator};
use phrases::{PhraseBook, StaticPhrases, TranslatingPhrases};
use runtime::{ProductionManager, RuntimeManager, RuntimeSettings};
use session::{MemorySessionStore, SessionStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use telegram::TelegramClient;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Per-attempt ceiling for generation calls
const GENERATION_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Local runs may keep credentials in .env
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "edgo=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env()?;

    // Session store
    let store: Arc<dyn SessionStore> = match &config.db_path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            tracing::info!(path = %path.display(), "Opening session database");
            let db = Database::open(path)?;
            let removed = db.reset_in_flight()?;
            if removed > 0 {
                tracing::info!(removed, "Dropped sessions interrupted mid-generation");
            }
            Arc::new(db)
        }
        None => {
            tracing::info!("Using in-memory session store");
            Arc::new(MemorySessionStore::new())
        }
    };

    // Generation client
    let backend = GeminiBackend::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        GENERATION_TIMEOUT,
    )?;
    let generator = RetryingGenerator::new(backend, RetryPolicy::default());
    tracing::info!(model = %config.gemini_model, "Generation client initialized");

    let phrases: Arc<dyn PhraseBook> = if config.translate_phrases {
        let translator: Arc<dyn TextGenerator> = Arc::new(RetryingGenerator::new(
            GeminiBackend::new(
                config.gemini_api_key.clone(),
                &config.gemini_model,
                GENERATION_TIMEOUT,
            )?,
            RetryPolicy::default(),
        ));
        Arc::new(TranslatingPhrases::new(translator))
    } else {
        Arc::new(StaticPhrases)
    };

    // Telegram
    let telegram = TelegramClient::new(config.telegram_token.clone());
    if let Some(url) = &config.webhook_url {
        match telegram.set_webhook(url).await {
            Ok(()) => tracing::info!(%url, "Webhook registered"),
            Err(e) => tracing::warn!(%url, error = %e, "Failed to register webhook"),
        }
    }

    let renderer = PdfRenderer::from_dir(&config.font_dir);
    tracing::info!(dir = %config.font_dir.display(), "Document fonts loaded");

    let manager: ProductionManager = RuntimeManager::new(
        store,
        generator,
        telegram,
        phrases,
        Arc::new(renderer),
        RuntimeSettings {
            max_message_chars: config.max_message_chars,
            worker_concurrency: config.worker_concurrency,
        },
    );

    let state = AppState::new(Arc::new(manager));
    let app = create_router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Edgo server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
