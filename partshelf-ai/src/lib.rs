//! partshelf-ai library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod config;
pub mod error;
pub mod fusion; // Merge layer: supplemental extraction + manual input
pub mod hints;
pub mod models;
pub mod services;
pub mod validators; // Required-field validation

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use partshelf_common::events::EventBus;

use crate::models::ExtractionSession;
use crate::services::{Extractor, SessionProcessor, Transcriber};

/// Active extraction sessions, keyed by session id **[PSA-WF-020]**
pub type SessionMap = Arc<RwLock<HashMap<Uuid, ExtractionSession>>>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// In-memory extraction sessions (no persistence; a restart loses them)
    pub sessions: SessionMap,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Speech-to-text backend; None when the AI credential is absent
    pub transcriber: Option<Arc<dyn Transcriber>>,
    /// Multimodal extraction backend; None when the AI credential is absent
    pub extractor: Option<Arc<dyn Extractor>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        event_bus: EventBus,
        transcriber: Option<Arc<dyn Transcriber>>,
        extractor: Option<Arc<dyn Extractor>>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            event_bus,
            transcriber,
            extractor,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Whether both AI backends are available
    pub fn ai_configured(&self) -> bool {
        self.transcriber.is_some() && self.extractor.is_some()
    }

    /// Build the processing driver for a session attempt.
    ///
    /// None when the AI credential is absent (handlers answer 503).
    pub fn processor(&self) -> Option<SessionProcessor> {
        let transcriber = self.transcriber.clone()?;
        let extractor = self.extractor.clone()?;
        Some(SessionProcessor::new(
            self.sessions.clone(),
            self.event_bus.clone(),
            transcriber,
            extractor,
        ))
    }

    /// Record the most recent error for /health diagnostics
    pub async fn record_error(&self, message: &str) {
        *self.last_error.write().await = Some(message.to_string());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        // Stateless AI service endpoints
        .merge(api::service_routes())
        // Session workflow endpoints
        .merge(api::session_routes())
        .route("/events", get(api::general_event_stream))
        .route("/ai/events", get(api::event_stream))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
