//! partshelf-ai - AI Assistant Microservice
//!
//! **Module Identity:**
//! - Name: partshelf-ai (AI assistant)
//! - Port: 5811
//!
//! Turns a voice recording (plus optional photos) into validated,
//! structured item data for the inventory's "add item" flow. Integrates
//! with the partshelf UI via HTTP REST + SSE.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use partshelf_common::events::EventBus;

use partshelf_ai::config::resolve_ai_settings;
use partshelf_ai::services::{ExtractionClient, Extractor, TranscriptionClient, Transcriber};
use partshelf_ai::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting partshelf-ai (AI assistant) microservice");
    info!("Port: 5811");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve the AI credential and backend settings (ENV → TOML)
    let settings = resolve_ai_settings();

    let transcriber: Option<Arc<dyn Transcriber>> =
        match TranscriptionClient::from_settings(&settings) {
            Some(Ok(client)) => Some(Arc::new(client)),
            Some(Err(e)) => {
                warn!("Failed to initialize transcription client: {}", e);
                None
            }
            None => None,
        };
    let extractor: Option<Arc<dyn Extractor>> = match ExtractionClient::from_settings(&settings) {
        Some(Ok(client)) => Some(Arc::new(client)),
        Some(Err(e)) => {
            warn!("Failed to initialize extraction client: {}", e);
            None
        }
        None => None,
    };

    if transcriber.is_some() && extractor.is_some() {
        info!("AI backends initialized ({})", settings.api_base);
    } else {
        warn!("AI features disabled — service endpoints will answer 503");
    }

    // Create event bus for SSE broadcasting
    let event_bus = EventBus::new(100); // 100 event capacity
    info!("Event bus initialized");

    // Create application state
    let state = AppState::new(event_bus, transcriber, extractor);

    // Build router
    let app = partshelf_ai::build_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("127.0.0.1:5811").await?;
    info!("Listening on http://127.0.0.1:5811");
    info!("Health check: http://127.0.0.1:5811/health");

    axum::serve(listener, app).await?;

    Ok(())
}
