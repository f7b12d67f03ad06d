//! Speech-to-text API client
//!
//! **[PSA-INT-010]** Sends raw audio to the hosted transcription endpoint
//! (OpenAI-compatible `/audio/transcriptions`) and returns plain text.
//! No automatic retries; retry is a user action at the session level.

use serde::Deserialize;
use std::time::Duration;

use crate::config::AiSettings;
use crate::services::{friendly_status_message, AiServiceError, Transcriber};

const USER_AGENT: &str = "partshelf/0.1.0 (https://github.com/partshelf/partshelf)";
const SERVICE_LABEL: &str = "Transcription";

/// Transcription endpoint response
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Speech-to-text API client
pub struct TranscriptionClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl TranscriptionClient {
    /// Build a client from resolved settings. Returns None when the
    /// credential is absent, leaving the feature disabled.
    pub fn from_settings(settings: &AiSettings) -> Option<Result<Self, AiServiceError>> {
        let api_key = settings.api_key.clone()?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AiServiceError::Network(e.to_string()))
            .map(|http_client| Self {
                http_client,
                api_base: settings.api_base.clone(),
                api_key,
                model: settings.transcription_model.clone(),
            });

        Some(client)
    }

    /// Pick an upload file name for the declared MIME type (the endpoint
    /// infers the container from the extension)
    fn file_name_for(mime_type: &str) -> &'static str {
        match mime_type {
            "audio/mp4" | "audio/m4a" => "recording.m4a",
            "audio/mpeg" => "recording.mp3",
            "audio/wav" => "recording.wav",
            "audio/ogg" => "recording.ogg",
            "audio/flac" => "recording.flac",
            _ => "recording.webm",
        }
    }
}

#[async_trait::async_trait]
impl Transcriber for TranscriptionClient {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, AiServiceError> {
        let url = format!("{}/audio/transcriptions", self.api_base);

        tracing::debug!(
            bytes = audio.len(),
            mime_type = %mime_type,
            "Sending audio for transcription"
        );

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(Self::file_name_for(mime_type))
            .mime_str(mime_type)
            .map_err(|e| AiServiceError::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AiServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiServiceError::Api {
                status: status.as_u16(),
                message: friendly_status_message(SERVICE_LABEL, status.as_u16(), &body),
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AiServiceError::Parse(e.to_string()))?;

        tracing::info!(chars = parsed.text.len(), "Transcription completed");

        Ok(parsed.text)
    }
}
