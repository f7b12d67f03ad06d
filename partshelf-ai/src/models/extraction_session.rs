//! Voice extraction session state machine
//!
//! **[PSA-WF-010]** A session progresses through:
//! images → voice → processing → {missing_fields | complete}, with
//! supplemental_voice → processing loops from missing_fields and a
//! recoverable error phase. The whole session is a single value; "start
//! over" replaces it with a fresh one instead of clearing fields one by
//! one.
//!
//! Transitions are applied through [`ExtractionSession::apply_event`],
//! which is deterministic and side-effect free apart from mutating the
//! session value; the async transcribe/extract driver lives in
//! `services::session_processor` and feeds its outcomes back in as events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::fusion::{apply_manual, merge_extraction, ManualFieldInputs};
use crate::models::{
    mark_completed, mark_failed, mark_running, ExtractedFormData, ExtractionContext, ImageStage,
    ProcessingStep, StepKind, TempImage,
};
use crate::validators::{validate, ExtractionValidation};

/// **[PSA-WF-010]** Session phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Collecting optional photos (0..3)
    Images,
    /// Waiting for the primary voice recording
    Voice,
    /// Transcribe → encode → extract attempt in flight
    Processing,
    /// Extraction usable but required fields remain
    MissingFields,
    /// Waiting for a supplemental recording
    SupplementalVoice,
    /// All required fields present (or user applied anyway)
    Complete,
    /// A processing attempt failed; recoverable
    Error,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Images => "images",
            SessionPhase::Voice => "voice",
            SessionPhase::Processing => "processing",
            SessionPhase::MissingFields => "missing_fields",
            SessionPhase::SupplementalVoice => "supplemental_voice",
            SessionPhase::Complete => "complete",
            SessionPhase::Error => "error",
        }
    }
}

/// Phase transition record (for events and logging)
#[derive(Debug, Clone, Serialize)]
pub struct PhaseTransition {
    pub session_id: Uuid,
    pub old_phase: SessionPhase,
    pub new_phase: SessionPhase,
    pub transitioned_at: DateTime<Utc>,
}

/// Events driving the session state machine
///
/// User actions arrive from the HTTP layer; `Step*` and `Processing*`
/// events arrive from the async processing driver and carry the attempt
/// number they belong to so outcomes of an abandoned attempt are dropped.
#[derive(Debug)]
pub enum SessionEvent {
    /// "skip" or "continue" out of the images phase (same transition)
    ImagesConfirmed,
    /// A completed recording was accepted; a processing attempt begins
    RecordingAccepted,
    StepStarted {
        attempt: u32,
        kind: StepKind,
    },
    StepFinished {
        attempt: u32,
        kind: StepKind,
        output: Option<String>,
    },
    ProcessingFailed {
        attempt: u32,
        kind: StepKind,
        message: String,
    },
    ProcessingSucceeded {
        attempt: u32,
        /// Full transcript after any supplemental concatenation
        transcript: String,
        extracted: ExtractedFormData,
    },
    /// Manual values for missing required fields
    ManualApplied(ManualFieldInputs),
    /// missing_fields → supplemental_voice
    RecordMore,
    /// Force completion despite missing fields (explicit escape hatch)
    ApplyAnyway,
    /// error → voice, keeping staged images only
    TryAgain,
    /// Full reset back to the images phase
    StartOver,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Cannot {action} while session is in the {phase} phase")]
    InvalidTransition {
        phase: &'static str,
        action: &'static str,
    },
}

/// One "add item by voice" interaction (in-memory only)
#[derive(Debug)]
pub struct ExtractionSession {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    /// Lookup lists captured at session start
    pub context: ExtractionContext,
    /// Staged photos (retained across supplemental rounds)
    pub images: ImageStage,
    /// Accumulated transcript across rounds
    pub transcript: Option<String>,
    /// Accumulated extracted data across rounds and manual input
    pub data: ExtractedFormData,
    /// Always recomputed after the data changes
    pub validation: ExtractionValidation,
    /// Retained manual inputs, re-applied over each supplemental merge
    pub manual: ManualFieldInputs,
    /// Steps of the current attempt only
    pub steps: Vec<ProcessingStep>,
    /// Failure message while in the error phase
    pub error: Option<String>,
    /// Monotonic attempt counter; outcomes for older attempts are dropped
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExtractionSession {
    pub fn new(context: ExtractionContext) -> Self {
        Self::with_identity(Uuid::new_v4(), context, Utc::now())
    }

    fn with_identity(session_id: Uuid, context: ExtractionContext, created_at: DateTime<Utc>) -> Self {
        let data = ExtractedFormData::default();
        let validation = validate(&data);
        Self {
            session_id,
            phase: SessionPhase::Images,
            context,
            images: ImageStage::new(),
            transcript: None,
            data,
            validation,
            manual: ManualFieldInputs::default(),
            steps: Vec::new(),
            error: None,
            attempt: 0,
            created_at,
            updated_at: created_at,
        }
    }

    /// Apply an event, returning the phase transition it caused (if any).
    ///
    /// Stale `Step*`/`Processing*` events (attempt mismatch, or the session
    /// already left the processing phase) are ignored rather than rejected:
    /// an abandoned attempt's eventual outcome is deliberately discarded.
    pub fn apply_event(
        &mut self,
        event: SessionEvent,
    ) -> Result<Option<PhaseTransition>, SessionError> {
        let transition = match event {
            SessionEvent::ImagesConfirmed => {
                self.require_phase(SessionPhase::Images, "confirm images")?;
                Some(self.transition_to(SessionPhase::Voice))
            }

            SessionEvent::RecordingAccepted => {
                if !matches!(
                    self.phase,
                    SessionPhase::Voice | SessionPhase::SupplementalVoice
                ) {
                    return Err(self.invalid("deliver recording"));
                }
                self.attempt += 1;
                self.steps = ProcessingStep::fresh_list();
                self.error = None;
                Some(self.transition_to(SessionPhase::Processing))
            }

            SessionEvent::StepStarted { attempt, kind } => {
                if self.is_current_attempt(attempt) {
                    mark_running(&mut self.steps, kind);
                    self.touch();
                }
                None
            }

            SessionEvent::StepFinished {
                attempt,
                kind,
                output,
            } => {
                if self.is_current_attempt(attempt) {
                    mark_completed(&mut self.steps, kind, output);
                    self.touch();
                }
                None
            }

            SessionEvent::ProcessingFailed {
                attempt,
                kind,
                message,
            } => {
                if !self.is_current_attempt(attempt) {
                    return Ok(None);
                }
                mark_failed(&mut self.steps, kind, message.clone());
                self.error = Some(message);
                Some(self.transition_to(SessionPhase::Error))
            }

            SessionEvent::ProcessingSucceeded {
                attempt,
                transcript,
                extracted,
            } => {
                if !self.is_current_attempt(attempt) {
                    return Ok(None);
                }
                self.transcript = Some(transcript);
                // Supplemental merge, then retained manual values on top,
                // then re-validate; never trust a stale validation.
                let merged = merge_extraction(&self.data, &extracted);
                self.data = apply_manual(&merged, &self.manual);
                self.validation = validate(&self.data);

                let next = if self.validation.is_complete {
                    SessionPhase::Complete
                } else {
                    SessionPhase::MissingFields
                };
                Some(self.transition_to(next))
            }

            SessionEvent::ManualApplied(inputs) => {
                self.require_phase(SessionPhase::MissingFields, "apply manual values")?;
                let inputs = inputs.sanitized();
                self.manual.absorb(&inputs);
                self.data = apply_manual(&self.data, &inputs);
                self.validation = validate(&self.data);

                if self.validation.is_complete {
                    Some(self.transition_to(SessionPhase::Complete))
                } else {
                    // Still incomplete: stay put. Only "apply anyway" may
                    // advance past missing fields.
                    self.touch();
                    None
                }
            }

            SessionEvent::RecordMore => {
                self.require_phase(SessionPhase::MissingFields, "record more")?;
                Some(self.transition_to(SessionPhase::SupplementalVoice))
            }

            SessionEvent::ApplyAnyway => {
                self.require_phase(SessionPhase::MissingFields, "apply anyway")?;
                Some(self.transition_to(SessionPhase::Complete))
            }

            SessionEvent::TryAgain => {
                self.require_phase(SessionPhase::Error, "try again")?;
                // Keep collected images; drop partial transcript/extraction.
                self.transcript = None;
                self.data = ExtractedFormData::default();
                self.validation = validate(&self.data);
                self.manual = ManualFieldInputs::default();
                self.steps = Vec::new();
                self.error = None;
                Some(self.transition_to(SessionPhase::Voice))
            }

            SessionEvent::StartOver => {
                let old_phase = self.phase;
                self.reset();
                Some(PhaseTransition {
                    session_id: self.session_id,
                    old_phase,
                    new_phase: SessionPhase::Images,
                    transitioned_at: self.updated_at,
                })
            }
        };

        Ok(transition)
    }

    /// Hand the finished session to the item-creation flow.
    ///
    /// Consumes the session; staged images transfer with their previews
    /// intact; the caller uploads and eventually releases them.
    pub fn into_applied(mut self) -> Result<(ExtractedFormData, Vec<TempImage>), SessionError> {
        if self.phase != SessionPhase::Complete {
            return Err(SessionError::InvalidTransition {
                phase: self.phase.as_str(),
                action: "apply to form",
            });
        }
        let images = self.images.take_all();
        Ok((self.data, images))
    }

    /// Abandon the session, releasing staged previews.
    /// Returns how many previews were released.
    pub fn abandon(&mut self) -> usize {
        self.images.release_all()
    }

    /// Full reset: previews released, whole value replaced
    fn reset(&mut self) {
        self.images.release_all();
        let attempt = self.attempt;
        *self = ExtractionSession::with_identity(
            self.session_id,
            std::mem::take(&mut self.context),
            self.created_at,
        );
        // The attempt counter stays monotonic so in-flight outcomes from
        // before the reset can never be mistaken for a new attempt's.
        self.attempt = attempt;
        self.updated_at = Utc::now();
    }

    fn is_current_attempt(&self, attempt: u32) -> bool {
        self.phase == SessionPhase::Processing && attempt == self.attempt
    }

    fn require_phase(
        &self,
        phase: SessionPhase,
        action: &'static str,
    ) -> Result<(), SessionError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                phase: self.phase.as_str(),
                action,
            })
        }
    }

    fn invalid(&self, action: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            phase: self.phase.as_str(),
            action,
        }
    }

    fn transition_to(&mut self, new_phase: SessionPhase) -> PhaseTransition {
        let transition = PhaseTransition {
            session_id: self.session_id,
            old_phase: self.phase,
            new_phase,
            transitioned_at: Utc::now(),
        };
        tracing::debug!(
            session_id = %self.session_id,
            old_phase = transition.old_phase.as_str(),
            new_phase = transition.new_phase.as_str(),
            "Session phase transition"
        );
        self.phase = new_phase;
        self.updated_at = transition.transitioned_at;
        transition
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
