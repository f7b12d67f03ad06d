//! Recording delivery validation
//!
//! The browser hands the session a finished recording; this module is the
//! capture boundary on the service side. Local capture failures
//! (microphone permission, unsupported browser) are reported by the client
//! before anything reaches here, so the checks below are the server's
//! whole recording contract: a supported audio MIME type and a non-empty
//! payload.

use thiserror::Error;

/// Accepted audio container/codec combinations
///
/// Any other `audio/*` type is also accepted; non-audio types are
/// rejected.
pub const AUDIO_MIME_ALLOWLIST: &[&str] = &[
    "audio/webm",
    "audio/mp4",
    "audio/mpeg",
    "audio/wav",
    "audio/ogg",
    "audio/flac",
    "audio/m4a",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoiceIntakeError {
    #[error("No audio file provided")]
    MissingAudio,

    #[error("Recording is empty")]
    EmptyRecording,

    #[error("Unsupported audio type: {0}")]
    UnsupportedMimeType(String),
}

/// A completed voice recording accepted into a session
#[derive(Debug, Clone)]
pub struct VoiceClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// Whether a declared MIME type is acceptable for transcription
pub fn is_supported_audio_mime(mime_type: &str) -> bool {
    // MediaRecorder appends codec parameters ("audio/webm;codecs=opus")
    let base = mime_type.split(';').next().unwrap_or("").trim();
    AUDIO_MIME_ALLOWLIST.contains(&base) || base.starts_with("audio/")
}

/// Validate a delivered recording and wrap it as a [`VoiceClip`]
pub fn accept_recording(bytes: Vec<u8>, mime_type: &str) -> Result<VoiceClip, VoiceIntakeError> {
    if !is_supported_audio_mime(mime_type) {
        return Err(VoiceIntakeError::UnsupportedMimeType(mime_type.to_string()));
    }
    if bytes.is_empty() {
        return Err(VoiceIntakeError::EmptyRecording);
    }

    let base = mime_type.split(';').next().unwrap_or(mime_type).trim();
    Ok(VoiceClip {
        bytes,
        mime_type: base.to_string(),
    })
}
