//! Per-attempt processing step tracking
//!
//! **[PSA-WF-030]** Every transcribe+extract attempt builds a fresh step
//! list so the UI always shows the current attempt from a clean slate.
//! Steps are ephemeral and never reused across attempts.

use serde::Serialize;
use uuid::Uuid;

/// The three steps of a processing attempt, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Remote speech-to-text call
    Transcribe,
    /// Local base64/data-URI preparation of staged images
    EncodeImages,
    /// Remote multimodal extraction call
    Extract,
}

impl StepKind {
    pub const ALL: [StepKind; 3] = [StepKind::Transcribe, StepKind::EncodeImages, StepKind::Extract];

    pub fn key(&self) -> &'static str {
        match self {
            StepKind::Transcribe => "transcribe",
            StepKind::EncodeImages => "encode_images",
            StepKind::Extract => "extract",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Transcribe => "Transcribing recording",
            StepKind::EncodeImages => "Preparing photos",
            StepKind::Extract => "Extracting item details",
        }
    }
}

/// Step status over the lifetime of one attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One step of a processing attempt
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStep {
    pub id: Uuid,
    pub kind: StepKind,
    pub label: &'static str,
    pub status: StepStatus,
    /// Step output shown to the user (e.g. the transcript)
    pub output: Option<String>,
    /// Failure message when status is Failed
    pub error: Option<String>,
}

impl ProcessingStep {
    fn new(kind: StepKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            label: kind.label(),
            status: StepStatus::Pending,
            output: None,
            error: None,
        }
    }

    /// Build the fresh step list for a new attempt
    pub fn fresh_list() -> Vec<ProcessingStep> {
        StepKind::ALL.iter().copied().map(ProcessingStep::new).collect()
    }
}

/// Mark a step running within an attempt's step list
pub fn mark_running(steps: &mut [ProcessingStep], kind: StepKind) {
    if let Some(step) = steps.iter_mut().find(|s| s.kind == kind) {
        step.status = StepStatus::Running;
    }
}

/// Mark a step completed, with optional output text
pub fn mark_completed(steps: &mut [ProcessingStep], kind: StepKind, output: Option<String>) {
    if let Some(step) = steps.iter_mut().find(|s| s.kind == kind) {
        step.status = StepStatus::Completed;
        step.output = output;
    }
}

/// Mark a step failed with the failure message
pub fn mark_failed(steps: &mut [ProcessingStep], kind: StepKind, message: String) {
    if let Some(step) = steps.iter_mut().find(|s| s.kind == kind) {
        step.status = StepStatus::Failed;
        step.error = Some(message);
    }
}
