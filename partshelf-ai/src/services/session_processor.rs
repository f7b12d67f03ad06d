//! Transcribe → encode → extract attempt driver
//!
//! **[PSA-WF-020]** Runs one processing attempt for a session as a
//! background task: remote transcription, local image encoding, remote
//! extraction, then feeds the outcome back into the session state machine
//! as events. Each remote call is bounded by [`REMOTE_CALL_TIMEOUT`].
//!
//! The driver never retries; failed attempts land the session in the
//! error phase and recovery is a user action. Outcomes that arrive after
//! the session was reset or deleted are dropped (the attempt number no
//! longer matches, or the session is gone).

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use partshelf_common::events::{EventBus, PartshelfEvent};

use crate::models::{PhaseTransition, SessionEvent, SessionPhase, StepKind};
use crate::services::{encode_all, AiServiceError, Extractor, Transcriber, VoiceClip};
use crate::SessionMap;

/// Deadline for each remote call within an attempt
pub const REMOTE_CALL_TIMEOUT: Duration = Duration::from_secs(60);

const NO_SPEECH_MESSAGE: &str =
    "No speech detected in the recording — try again closer to the microphone";

/// Drives processing attempts for extraction sessions
pub struct SessionProcessor {
    sessions: SessionMap,
    event_bus: EventBus,
    transcriber: Arc<dyn Transcriber>,
    extractor: Arc<dyn Extractor>,
    call_timeout: Duration,
}

impl SessionProcessor {
    pub fn new(
        sessions: SessionMap,
        event_bus: EventBus,
        transcriber: Arc<dyn Transcriber>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        Self {
            sessions,
            event_bus,
            transcriber,
            extractor,
            call_timeout: REMOTE_CALL_TIMEOUT,
        }
    }

    /// Override the remote-call deadline (tests)
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Run one processing attempt to completion.
    ///
    /// Spawned from the recording handler after the session accepted the
    /// recording and moved to the processing phase.
    pub async fn run_attempt(&self, session_id: Uuid, attempt: u32, clip: VoiceClip) {
        tracing::info!(
            session_id = %session_id,
            attempt = attempt,
            bytes = clip.bytes.len(),
            mime_type = %clip.mime_type,
            "Processing attempt started"
        );

        // Step 1: transcribe
        if self
            .step_started(session_id, attempt, StepKind::Transcribe)
            .await
            .is_none()
        {
            return;
        }

        let transcript = match self
            .timed("Transcription", self.transcriber.transcribe(&clip.bytes, &clip.mime_type))
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                return self
                    .fail_attempt(session_id, attempt, StepKind::Transcribe, e.to_string())
                    .await;
            }
        };

        // Blank transcript is an input failure, not a service error
        if transcript.is_empty() {
            return self
                .fail_attempt(
                    session_id,
                    attempt,
                    StepKind::Transcribe,
                    NO_SPEECH_MESSAGE.to_string(),
                )
                .await;
        }

        if self
            .step_finished(
                session_id,
                attempt,
                StepKind::Transcribe,
                Some(transcript.clone()),
            )
            .await
            .is_none()
        {
            return;
        }

        // Step 2: encode staged images (local, cannot fail; tracked for
        // user visibility)
        if self
            .step_started(session_id, attempt, StepKind::EncodeImages)
            .await
            .is_none()
        {
            return;
        }

        let (payloads, prior_transcript, context) = {
            let sessions = self.sessions.read().await;
            let Some(session) = sessions.get(&session_id) else {
                return;
            };
            (
                session.images.payloads(),
                session.transcript.clone(),
                session.context.clone(),
            )
        };
        let encoded = encode_all(&payloads);

        if self
            .step_finished(
                session_id,
                attempt,
                StepKind::EncodeImages,
                Some(format!("{} photo(s) prepared", encoded.len())),
            )
            .await
            .is_none()
        {
            return;
        }

        // Supplemental rounds run extraction on the accumulated transcript
        let combined = match prior_transcript {
            Some(prior) => format!("{}\n\nAdditional details: {}", prior, transcript),
            None => transcript,
        };

        // Step 3: extract
        if self
            .step_started(session_id, attempt, StepKind::Extract)
            .await
            .is_none()
        {
            return;
        }

        let extracted = match self
            .timed(
                "Extraction",
                self.extractor.extract(&combined, &encoded, &context),
            )
            .await
        {
            Ok(data) => data,
            Err(e) => {
                return self
                    .fail_attempt(session_id, attempt, StepKind::Extract, e.to_string())
                    .await;
            }
        };

        if self
            .step_finished(session_id, attempt, StepKind::Extract, None)
            .await
            .is_none()
        {
            return;
        }

        let transition = self
            .apply(
                session_id,
                SessionEvent::ProcessingSucceeded {
                    attempt,
                    transcript: combined,
                    extracted,
                },
            )
            .await;

        if let Some(transition) = transition.flatten() {
            broadcast_transition(&self.event_bus, &transition, None);
        }

        tracing::info!(
            session_id = %session_id,
            attempt = attempt,
            "Processing attempt finished"
        );
    }

    /// Bound a remote call by the attempt deadline
    async fn timed<T>(
        &self,
        label: &'static str,
        call: impl Future<Output = Result<T, AiServiceError>>,
    ) -> Result<T, AiServiceError> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AiServiceError::Timeout(label)),
        }
    }

    /// Apply an event to the session.
    ///
    /// Outer None: the session no longer exists, stop the attempt.
    /// Inner Option: the phase transition the event caused, if any.
    async fn apply(
        &self,
        session_id: Uuid,
        event: SessionEvent,
    ) -> Option<Option<PhaseTransition>> {
        let mut sessions = self.sessions.write().await;
        let session = match sessions.get_mut(&session_id) {
            Some(session) => session,
            None => {
                tracing::debug!(
                    session_id = %session_id,
                    "Session gone; dropping processing event"
                );
                return None;
            }
        };

        match session.apply_event(event) {
            Ok(transition) => Some(transition),
            Err(e) => {
                // The session moved on (reset mid-attempt); the outcome is
                // discarded by design.
                tracing::debug!(session_id = %session_id, "{}", e);
                Some(None)
            }
        }
    }

    async fn step_started(
        &self,
        session_id: Uuid,
        attempt: u32,
        kind: StepKind,
    ) -> Option<()> {
        self.apply(session_id, SessionEvent::StepStarted { attempt, kind })
            .await?;
        self.emit_step(session_id, attempt, kind, "running", None);
        Some(())
    }

    async fn step_finished(
        &self,
        session_id: Uuid,
        attempt: u32,
        kind: StepKind,
        output: Option<String>,
    ) -> Option<()> {
        self.apply(
            session_id,
            SessionEvent::StepFinished {
                attempt,
                kind,
                output: output.clone(),
            },
        )
        .await?;
        self.emit_step(session_id, attempt, kind, "completed", output);
        Some(())
    }

    /// Mark the failing step, move the session to the error phase and
    /// broadcast the failure.
    async fn fail_attempt(&self, session_id: Uuid, attempt: u32, kind: StepKind, message: String) {
        tracing::warn!(
            session_id = %session_id,
            attempt = attempt,
            step = kind.key(),
            error = %message,
            "Processing attempt failed"
        );

        let Some(transition) = self
            .apply(
                session_id,
                SessionEvent::ProcessingFailed {
                    attempt,
                    kind,
                    message: message.clone(),
                },
            )
            .await
        else {
            return;
        };

        self.emit_step(session_id, attempt, kind, "failed", Some(message.clone()));

        if let Some(transition) = transition {
            broadcast_transition(&self.event_bus, &transition, Some(message));
        }
    }

    fn emit_step(
        &self,
        session_id: Uuid,
        attempt: u32,
        kind: StepKind,
        status: &str,
        detail: Option<String>,
    ) {
        self.event_bus
            .emit_lossy(PartshelfEvent::ExtractionStepUpdate {
                session_id,
                attempt,
                step: kind.key().to_string(),
                status: status.to_string(),
                detail,
                timestamp: Utc::now(),
            });
    }

}

/// Broadcast a phase transition (and its terminal completed/failed event)
/// over the event bus
pub fn broadcast_transition(
    event_bus: &EventBus,
    transition: &PhaseTransition,
    failure: Option<String>,
) {
    event_bus.emit_lossy(PartshelfEvent::ExtractionPhaseChanged {
        session_id: transition.session_id,
        old_phase: transition.old_phase.as_str().to_string(),
        new_phase: transition.new_phase.as_str().to_string(),
        timestamp: transition.transitioned_at,
    });

    match transition.new_phase {
        SessionPhase::Complete => {
            event_bus.emit_lossy(PartshelfEvent::ExtractionSessionCompleted {
                session_id: transition.session_id,
                timestamp: transition.transitioned_at,
            });
        }
        SessionPhase::Error => {
            event_bus.emit_lossy(PartshelfEvent::ExtractionSessionFailed {
                session_id: transition.session_id,
                message: failure.unwrap_or_else(|| "Processing failed".to_string()),
                timestamp: transition.transitioned_at,
            });
        }
        _ => {}
    }
}
