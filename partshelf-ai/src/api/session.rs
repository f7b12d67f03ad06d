//! Extraction session API handlers
//!
//! **[PSA-API-020]** The HTTP surface driving the session state machine:
//! start/status, image staging, recording delivery, manual values, the
//! missing-field actions, reset/retry, and the final apply handoff.

use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use partshelf_common::events::PartshelfEvent;

use crate::error::{ApiError, ApiResult};
use crate::hints::troubleshooting_hint;
use crate::models::{
    ExtractedFormData, ExtractionContext, ExtractionSession, LookupEntry, ProcessingStep,
    SessionEvent, SessionPhase, StagedImageInfo,
};
use crate::fusion::ManualFieldInputs;
use crate::services::{broadcast_transition, sniff_image_mime};
use crate::validators::ExtractionValidation;
use crate::AppState;

/// POST /ai/session request
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StartSessionRequest {
    pub categories: Vec<LookupEntry>,
    pub vendors: Vec<LookupEntry>,
    pub existing_tags: Vec<String>,
}

/// POST /ai/session response
#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Full session status, returned by most session endpoints
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub attempt: u32,
    pub images: Vec<StagedImageInfo>,
    pub steps: Vec<ProcessingStep>,
    pub transcript: Option<String>,
    pub data: ExtractedFormData,
    pub validation: ExtractionValidation,
    pub error: Option<String>,
    /// Cosmetic troubleshooting tip, present only in the error phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

impl SessionStatusResponse {
    fn from_session(session: &ExtractionSession) -> Self {
        let hint = match (session.phase, &session.error) {
            (SessionPhase::Error, Some(message)) => troubleshooting_hint(message),
            _ => None,
        };
        Self {
            session_id: session.session_id,
            phase: session.phase,
            attempt: session.attempt,
            images: session.images.infos(),
            steps: session.steps.clone(),
            transcript: session.transcript.clone(),
            data: session.data.clone(),
            validation: session.validation.clone(),
            error: session.error.clone(),
            hint,
        }
    }
}

/// POST /ai/session/{id}/apply response: ownership of the extracted data
/// and the staged images transfers to the item-creation flow
#[derive(Debug, Serialize)]
pub struct ApplySessionResponse {
    pub session_id: Uuid,
    pub form_data: ExtractedFormData,
    pub images: Vec<AppliedImage>,
}

#[derive(Debug, Serialize)]
pub struct AppliedImage {
    pub id: Uuid,
    pub mime_type: String,
    pub is_primary: bool,
    /// Raw bytes, base64 (the item form uploads these after persisting
    /// the parent item)
    pub data: String,
}

/// DELETE /ai/session/{id} response
#[derive(Debug, Serialize)]
pub struct AbandonSessionResponse {
    pub session_id: Uuid,
    pub images_released: usize,
}

/// POST /ai/session
///
/// Create a session in the images phase, capturing the catalog lookup
/// lists the extraction model will match against.
pub async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> ApiResult<Json<StartSessionResponse>> {
    let context = ExtractionContext {
        categories: request.categories,
        vendors: request.vendors,
        existing_tags: request.existing_tags,
    };
    let session = ExtractionSession::new(context);
    let response = StartSessionResponse {
        session_id: session.session_id,
        phase: session.phase,
        created_at: session.created_at,
    };

    tracing::info!(session_id = %session.session_id, "Extraction session started");

    state.event_bus.emit_lossy(PartshelfEvent::ExtractionSessionStarted {
        session_id: session.session_id,
        timestamp: session.created_at,
    });

    state
        .sessions
        .write()
        .await
        .insert(session.session_id, session);

    Ok(Json(response))
}

/// GET /ai/session/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionStatusResponse>> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| not_found(session_id))?;
    Ok(Json(SessionStatusResponse::from_session(session)))
}

/// POST /ai/session/{id}/images
///
/// Stage a photo (multipart `image` field). The MIME type is sniffed from
/// header bytes; the first staged image becomes primary.
pub async fn upload_image(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<Vec<StagedImageInfo>>> {
    let mut payload: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Malformed multipart request: {}", e))
    })? {
        if field.name() == Some("image") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Failed to read image field: {}", e)))?
                .to_vec();
            payload = Some(bytes);
            break;
        }
    }
    let payload = payload.ok_or_else(|| ApiError::BadRequest("No image file provided".to_string()))?;

    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or_else(|| not_found(session_id))?;

    if session.phase != SessionPhase::Images {
        return Err(ApiError::Conflict(format!(
            "Cannot add images while session is in the {} phase",
            session.phase.as_str()
        )));
    }

    let mime_type = sniff_image_mime(&payload).to_string();
    session
        .images
        .stage(payload, mime_type)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(session.images.infos()))
}

/// DELETE /ai/session/{id}/images/{image_id}
pub async fn remove_image(
    State(state): State<AppState>,
    Path((session_id, image_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<StagedImageInfo>>> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or_else(|| not_found(session_id))?;

    if !session.images.remove(image_id) {
        return Err(ApiError::NotFound(format!(
            "Staged image not found: {}",
            image_id
        )));
    }

    Ok(Json(session.images.infos()))
}

/// POST /ai/session/{id}/images/{image_id}/primary
pub async fn set_primary_image(
    State(state): State<AppState>,
    Path((session_id, image_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Vec<StagedImageInfo>>> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get_mut(&session_id)
        .ok_or_else(|| not_found(session_id))?;

    if !session.images.set_primary(image_id) {
        return Err(ApiError::NotFound(format!(
            "Staged image not found: {}",
            image_id
        )));
    }

    Ok(Json(session.images.infos()))
}

/// GET /ai/session/{id}/images/{image_id}/preview
pub async fn image_preview(
    State(state): State<AppState>,
    Path((session_id, image_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Response> {
    let sessions = state.sessions.read().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| not_found(session_id))?;
    let image = session.images.get(image_id).ok_or_else(|| {
        ApiError::NotFound(format!("Staged image not found: {}", image_id))
    })?;

    Ok((
        [(header::CONTENT_TYPE, image.mime_type.clone())],
        image.bytes.clone(),
    )
        .into_response())
}

/// POST /ai/session/{id}/continue
///
/// images → voice. "Skip" and "continue" are the same transition; images
/// staged so far are retained either way.
pub async fn confirm_images(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionStatusResponse>> {
    apply_user_event(&state, session_id, SessionEvent::ImagesConfirmed).await
}

/// POST /ai/session/{id}/recording
///
/// Deliver a completed recording (multipart `audio` field). Valid in the
/// voice and supplemental_voice phases; 409 while an attempt is already
/// processing. Spawns the transcribe → encode → extract pipeline.
pub async fn deliver_recording(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<SessionStatusResponse>> {
    let processor = state.processor().ok_or_else(|| {
        ApiError::ServiceUnavailable("AI features not configured".to_string())
    })?;

    let clip = super::transcribe::read_audio_field(multipart).await?;

    let (attempt, response, transition) = {
        let mut sessions = state.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found(session_id))?;

        if session.phase == SessionPhase::Processing {
            return Err(ApiError::Conflict(
                "A recording is already being processed for this session".to_string(),
            ));
        }

        let transition = session
            .apply_event(SessionEvent::RecordingAccepted)
            .map_err(|e| ApiError::Conflict(e.to_string()))?;

        (
            session.attempt,
            SessionStatusResponse::from_session(session),
            transition,
        )
    };

    if let Some(transition) = transition {
        broadcast_transition(&state.event_bus, &transition, None);
    }

    // Background task; its outcome re-enters the session as events
    tokio::spawn(async move {
        processor.run_attempt(session_id, attempt, clip).await;
    });

    Ok(Json(response))
}

/// POST /ai/session/{id}/manual
///
/// Apply manual values for missing required fields. Never advances past
/// remaining gaps; only a complete validation (or "apply anyway") moves
/// the session to complete.
pub async fn apply_manual_values(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(inputs): Json<ManualFieldInputs>,
) -> ApiResult<Json<SessionStatusResponse>> {
    apply_user_event(&state, session_id, SessionEvent::ManualApplied(inputs)).await
}

/// POST /ai/session/{id}/record-more
pub async fn record_more(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionStatusResponse>> {
    apply_user_event(&state, session_id, SessionEvent::RecordMore).await
}

/// POST /ai/session/{id}/apply-anyway
pub async fn apply_anyway(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionStatusResponse>> {
    apply_user_event(&state, session_id, SessionEvent::ApplyAnyway).await
}

/// POST /ai/session/{id}/try-again
pub async fn try_again(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionStatusResponse>> {
    apply_user_event(&state, session_id, SessionEvent::TryAgain).await
}

/// POST /ai/session/{id}/start-over
pub async fn start_over(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionStatusResponse>> {
    apply_user_event(&state, session_id, SessionEvent::StartOver).await
}

/// POST /ai/session/{id}/apply
///
/// complete → exit. The final record and the staged images (previews
/// intact) transfer to the item-creation flow; the session is removed.
pub async fn apply_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ApplySessionResponse>> {
    let mut sessions = state.sessions.write().await;
    let session = sessions
        .get(&session_id)
        .ok_or_else(|| not_found(session_id))?;

    if session.phase != SessionPhase::Complete {
        return Err(ApiError::BadRequest(format!(
            "Cannot apply while session is in the {} phase",
            session.phase.as_str()
        )));
    }

    let session = sessions.remove(&session_id).expect("checked above");
    let (form_data, images) = session
        .into_applied()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let images = images
        .into_iter()
        .map(|image| AppliedImage {
            id: image.id,
            mime_type: image.mime_type.clone(),
            is_primary: image.is_primary,
            data: BASE64.encode(&image.bytes),
        })
        .collect();

    tracing::info!(session_id = %session_id, "Extraction session applied to item form");

    Ok(Json(ApplySessionResponse {
        session_id,
        form_data,
        images,
    }))
}

/// DELETE /ai/session/{id}
///
/// Abandon the session; staged previews are released.
pub async fn abandon_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<AbandonSessionResponse>> {
    let mut sessions = state.sessions.write().await;
    let mut session = sessions
        .remove(&session_id)
        .ok_or_else(|| not_found(session_id))?;

    let images_released = session.abandon();

    tracing::info!(
        session_id = %session_id,
        images_released = images_released,
        "Extraction session abandoned"
    );

    Ok(Json(AbandonSessionResponse {
        session_id,
        images_released,
    }))
}

/// Apply a user action to the session and return the refreshed status
async fn apply_user_event(
    state: &AppState,
    session_id: Uuid,
    event: SessionEvent,
) -> ApiResult<Json<SessionStatusResponse>> {
    let (response, transition, failure) = {
        let mut sessions = state.sessions.write().await;
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| not_found(session_id))?;

        let transition = session
            .apply_event(event)
            .map_err(|e| ApiError::Conflict(e.to_string()))?;

        (
            SessionStatusResponse::from_session(session),
            transition,
            session.error.clone(),
        )
    };

    if let Some(transition) = transition {
        broadcast_transition(&state.event_bus, &transition, failure);
    }

    Ok(Json(response))
}

fn not_found(session_id: Uuid) -> ApiError {
    ApiError::NotFound(format!("Extraction session not found: {}", session_id))
}

/// Build session workflow routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/session", post(start_session))
        .route(
            "/ai/session/:session_id",
            get(get_session).delete(abandon_session),
        )
        .route("/ai/session/:session_id/images", post(upload_image))
        .route(
            "/ai/session/:session_id/images/:image_id",
            delete(remove_image),
        )
        .route(
            "/ai/session/:session_id/images/:image_id/primary",
            post(set_primary_image),
        )
        .route(
            "/ai/session/:session_id/images/:image_id/preview",
            get(image_preview),
        )
        .route("/ai/session/:session_id/continue", post(confirm_images))
        .route("/ai/session/:session_id/recording", post(deliver_recording))
        .route("/ai/session/:session_id/manual", post(apply_manual_values))
        .route("/ai/session/:session_id/record-more", post(record_more))
        .route("/ai/session/:session_id/apply-anyway", post(apply_anyway))
        .route("/ai/session/:session_id/try-again", post(try_again))
        .route("/ai/session/:session_id/start-over", post(start_over))
        .route("/ai/session/:session_id/apply", post(apply_session))
}
