//! Transcription endpoint
//!
//! POST /ai/transcribe: multipart form with an `audio` file field.
//! Accepts the audio MIME allow-list (or any `audio/*`); 400 on missing
//! file or unsupported type; 503 when the AI credential is absent.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::services::accept_recording;
use crate::AppState;

/// POST /ai/transcribe response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

pub async fn transcribe_audio(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<TranscribeResponse>> {
    let transcriber = state.transcriber.clone().ok_or_else(|| {
        ApiError::ServiceUnavailable("AI features not configured".to_string())
    })?;

    let clip = read_audio_field(multipart).await?;

    let text = match transcriber.transcribe(&clip.bytes, &clip.mime_type).await {
        Ok(text) => text,
        Err(e) => {
            state.record_error(&e.to_string()).await;
            return Err(e.into());
        }
    };

    Ok(Json(TranscribeResponse { text }))
}

/// Pull the `audio` field out of the multipart body and validate it
pub(crate) async fn read_audio_field(
    mut multipart: Multipart,
) -> ApiResult<crate::services::VoiceClip> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Malformed multipart request: {}", e))
    })? {
        if field.name() != Some("audio") {
            continue;
        }

        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read audio field: {}", e)))?
            .to_vec();

        return accept_recording(bytes, &mime_type)
            .map_err(|e| ApiError::BadRequest(e.to_string()));
    }

    Err(ApiError::BadRequest(
        crate::services::VoiceIntakeError::MissingAudio.to_string(),
    ))
}
