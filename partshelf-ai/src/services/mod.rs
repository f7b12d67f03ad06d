//! Service layer: remote AI adapters and the session processing driver

mod extraction_client;
mod image_encoder;
mod session_processor;
mod transcription_client;
mod voice_intake;

pub use extraction_client::ExtractionClient;
pub use image_encoder::{encode_all, sniff_image_mime, EncodedImage};
pub use session_processor::{broadcast_transition, SessionProcessor, REMOTE_CALL_TIMEOUT};
pub use transcription_client::TranscriptionClient;
pub use voice_intake::{accept_recording, is_supported_audio_mime, VoiceClip, VoiceIntakeError};

use crate::models::{ExtractedFormData, ExtractionContext};
use thiserror::Error;

/// Errors raised by the remote AI adapters
///
/// **[PSA-ERR-010]** Messages are user-facing display text; callers must
/// not branch program logic on them. The only allowed read is the
/// cosmetic troubleshooting-tip substring matcher in `hints`.
#[derive(Debug, Clone, Error)]
pub enum AiServiceError {
    /// The AI credential is absent; no call was attempted
    #[error("AI features not configured")]
    NotConfigured,

    /// Transport-level failure (connection, TLS, body read)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx from the remote service; message already status-mapped
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The model reply was not the expected JSON
    #[error("Failed to parse AI response: {0}")]
    Parse(String),

    /// The remote call exceeded the session-level deadline
    #[error("{0} timed out — the AI service did not respond")]
    Timeout(&'static str),
}

/// Speech-to-text boundary, stubbed in tests
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe raw audio. May return empty text; "no speech detected"
    /// is the caller's failure to raise, not this service's.
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, AiServiceError>;
}

/// Multimodal extraction boundary, stubbed in tests
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        text: &str,
        images: &[EncodedImage],
        context: &ExtractionContext,
    ) -> Result<ExtractedFormData, AiServiceError>;
}

/// Map a non-2xx response to user-facing display text.
///
/// Well-known status codes get friendlier wording; anything else uses the
/// remote error payload's message when parseable, falling back to a
/// generic status line.
pub(crate) fn friendly_status_message(service: &str, status: u16, body: &str) -> String {
    match status {
        401 => format!(
            "{} failed: the configured AI API key is invalid or not authorized",
            service
        ),
        429 => format!(
            "{} is rate limited — wait a moment before trying again",
            service
        ),
        503 => format!(
            "{} is temporarily unavailable — try again shortly",
            service
        ),
        _ => match remote_error_message(body) {
            Some(message) => format!("{} failed: {}", service, message),
            None => format!("{} failed (status {})", service, status),
        },
    }
}

/// Pull the `error.message` string out of an OpenAI-style error payload
fn remote_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}
