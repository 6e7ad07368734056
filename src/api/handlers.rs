//! HTTP request handlers

use super::AppState;
use crate::state_machine::Event;
use crate::telegram::parse_update;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Router,
};

/// Body of every webhook acknowledgment
pub const ACK: &str = "ok";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/webhook", post(webhook))
        .with_state(state)
}

async fn liveness() -> &'static str {
    "Edgo bot is running"
}

/// Acknowledge every delivery.
///
/// The body is parsed by hand so that malformed or non-text updates still
/// get a 200; Telegram would otherwise redeliver them indefinitely.
async fn webhook(State(state): State<AppState>, body: Bytes) -> &'static str {
    match parse_update(&body) {
        Some((user, text)) => {
            tracing::info!(user_id = %user, "Received message");
            state
                .dispatcher
                .dispatch(user, Event::user_message(text))
                .await;
        }
        None => {
            tracing::debug!(bytes = body.len(), "Ignoring update without text message");
        }
    }
    ACK
}
