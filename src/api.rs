//! HTTP API
//!
//! Telegram delivers updates to `POST /webhook`; `GET /` answers liveness
//! checks.

mod handlers;

pub use handlers::create_router;

use crate::runtime::Dispatch;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<dyn Dispatch>,
}

impl AppState {
    pub fn new(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self { dispatcher }
    }
}
