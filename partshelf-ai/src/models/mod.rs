//! Data models for partshelf-ai

mod extraction_session;
mod form_data;
mod processing;
mod staged_image;

pub use extraction_session::{
    ExtractionSession, PhaseTransition, SessionError, SessionEvent, SessionPhase,
};
pub use form_data::{ExtractedFormData, ExtractionContext, LookupEntry, TrackingMode};
pub use processing::{
    mark_completed, mark_failed, mark_running, ProcessingStep, StepKind, StepStatus,
};
pub use staged_image::{
    ImageStage, StageError, StagedImageInfo, TempImage, MAX_STAGED_IMAGES,
};
