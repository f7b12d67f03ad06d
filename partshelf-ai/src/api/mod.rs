//! HTTP API handlers for partshelf-ai
//!
//! **[PSA-API-010]** REST + SSE surface consumed by the inventory UI

pub mod extract;
pub mod health;
pub mod session;
pub mod sse;
pub mod transcribe;

pub use health::health_routes;
pub use session::session_routes;
pub use sse::{event_stream, general_event_stream};

use crate::AppState;
use axum::routing::post;
use axum::Router;

/// Stateless AI service endpoints (no session involved)
pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/transcribe", post(transcribe::transcribe_audio))
        .route("/ai/extract", post(extract::extract_item))
}
