//! Extraction session scenario tests
//!
//! Drives the session state machine through the processing pipeline with
//! scripted transcription/extraction backends, covering the happy path,
//! the missing-field loop, the supplemental merge loop, the error path
//! and resource cleanup.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use partshelf_common::events::EventBus;

use partshelf_ai::fusion::ManualFieldInputs;
use partshelf_ai::models::{
    ExtractedFormData, ExtractionContext, ExtractionSession, SessionEvent, SessionPhase,
    StepKind, StepStatus,
};
use partshelf_ai::services::{
    AiServiceError, EncodedImage, Extractor, SessionProcessor, Transcriber, VoiceClip,
};
use partshelf_ai::validators::RequiredField;
use partshelf_ai::SessionMap;

/// Transcriber that replays a scripted sequence of outcomes
struct ScriptedTranscriber {
    replies: Mutex<VecDeque<Result<String, AiServiceError>>>,
}

impl ScriptedTranscriber {
    fn new(replies: Vec<Result<String, AiServiceError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Result<String, AiServiceError> {
        self.replies
            .lock()
            .await
            .pop_front()
            .expect("unexpected transcribe call")
    }
}

/// Extractor that replays scripted outcomes and records the text it saw
struct ScriptedExtractor {
    replies: Mutex<VecDeque<Result<ExtractedFormData, AiServiceError>>>,
    seen_text: Mutex<Vec<String>>,
    seen_image_counts: Mutex<Vec<usize>>,
}

impl ScriptedExtractor {
    fn new(replies: Vec<Result<ExtractedFormData, AiServiceError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            seen_text: Mutex::new(Vec::new()),
            seen_image_counts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait::async_trait]
impl Extractor for ScriptedExtractor {
    async fn extract(
        &self,
        text: &str,
        images: &[EncodedImage],
        _context: &ExtractionContext,
    ) -> Result<ExtractedFormData, AiServiceError> {
        self.seen_text.lock().await.push(text.to_string());
        self.seen_image_counts.lock().await.push(images.len());
        self.replies
            .lock()
            .await
            .pop_front()
            .expect("unexpected extract call")
    }
}

struct Harness {
    sessions: SessionMap,
    processor: SessionProcessor,
    session_id: Uuid,
}

impl Harness {
    async fn new(
        transcriber: Arc<ScriptedTranscriber>,
        extractor: Arc<ScriptedExtractor>,
    ) -> Self {
        let sessions: SessionMap = Arc::new(RwLock::new(HashMap::new()));
        let event_bus = EventBus::new(64);
        let processor = SessionProcessor::new(
            sessions.clone(),
            event_bus,
            transcriber,
            extractor,
        );

        let session = ExtractionSession::new(ExtractionContext::default());
        let session_id = session.session_id;
        sessions.write().await.insert(session_id, session);

        Self {
            sessions,
            processor,
            session_id,
        }
    }

    async fn apply(&self, event: SessionEvent) {
        let mut sessions = self.sessions.write().await;
        sessions
            .get_mut(&self.session_id)
            .unwrap()
            .apply_event(event)
            .unwrap();
    }

    /// Deliver a recording and run the attempt to completion
    async fn record(&self) {
        let attempt = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(&self.session_id).unwrap();
            session.apply_event(SessionEvent::RecordingAccepted).unwrap();
            session.attempt
        };
        let clip = VoiceClip {
            bytes: vec![1, 2, 3],
            mime_type: "audio/webm".to_string(),
        };
        self.processor
            .run_attempt(self.session_id, attempt, clip)
            .await;
    }

    async fn with_session<T>(&self, f: impl FnOnce(&ExtractionSession) -> T) -> T {
        let sessions = self.sessions.read().await;
        f(sessions.get(&self.session_id).unwrap())
    }
}

#[tokio::test]
async fn happy_path_reaches_complete_with_exact_data() {
    let transcriber = ScriptedTranscriber::new(vec![Ok(
        "Arduino Uno, qty 3, $24.99, http://shop/x".to_string()
    )]);
    let extracted = ExtractedFormData {
        name: Some("Arduino Uno".to_string()),
        quantity: Some(3),
        purchase_price: Some(24.99),
        purchase_url: Some("http://shop/x".to_string()),
        ..Default::default()
    };
    let extractor = ScriptedExtractor::new(vec![Ok(extracted.clone())]);
    let harness = Harness::new(transcriber, extractor).await;

    // Skip images, record voice
    harness.apply(SessionEvent::ImagesConfirmed).await;
    harness.record().await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::Complete);
            assert_eq!(session.data, extracted);
            assert!(session.validation.is_complete);
            assert!(session
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Completed));
        })
        .await;
}

#[tokio::test]
async fn missing_field_loop_requires_explicit_apply_anyway() {
    let transcriber = ScriptedTranscriber::new(vec![Ok("an Arduino Uno".to_string())]);
    let extractor = ScriptedExtractor::new(vec![Ok(ExtractedFormData {
        name: Some("Arduino Uno".to_string()),
        ..Default::default()
    })]);
    let harness = Harness::new(transcriber, extractor).await;

    harness.apply(SessionEvent::ImagesConfirmed).await;
    harness.record().await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::MissingFields);
            assert_eq!(
                session.validation.missing_required,
                vec![
                    RequiredField::Quantity,
                    RequiredField::PurchasePrice,
                    RequiredField::PurchaseUrl,
                ]
            );
        })
        .await;

    // Manual quantity only: still 2 missing, no auto-advance
    harness
        .apply(SessionEvent::ManualApplied(ManualFieldInputs {
            quantity: Some(3),
            ..Default::default()
        }))
        .await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::MissingFields);
            assert_eq!(session.validation.missing_required.len(), 2);
            assert_eq!(session.data.quantity, Some(3));
        })
        .await;

    // Explicit escape hatch
    harness.apply(SessionEvent::ApplyAnyway).await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::Complete);
            // The two still-blank fields remain absent in the final record
            assert!(session.data.purchase_price.is_none());
            assert!(session.data.purchase_url.is_none());
        })
        .await;
}

#[tokio::test]
async fn supplemental_round_concatenates_and_merges() {
    let transcriber = ScriptedTranscriber::new(vec![
        Ok("a widget".to_string()),
        Ok("five of them at $9.99".to_string()),
    ]);
    let extractor = ScriptedExtractor::new(vec![
        Ok(ExtractedFormData {
            name: Some("Widget".to_string()),
            ..Default::default()
        }),
        Ok(ExtractedFormData {
            quantity: Some(5),
            purchase_price: Some(9.99),
            ..Default::default()
        }),
    ]);
    let extractor_handle = extractor.clone();
    let harness = Harness::new(transcriber, extractor).await;

    harness.apply(SessionEvent::ImagesConfirmed).await;
    harness.record().await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::MissingFields);
        })
        .await;

    harness.apply(SessionEvent::RecordMore).await;
    harness.record().await;

    harness
        .with_session(|session| {
            // Merged record keeps the first round's name
            assert_eq!(session.data.name.as_deref(), Some("Widget"));
            assert_eq!(session.data.quantity, Some(5));
            assert_eq!(session.data.purchase_price, Some(9.99));
            // Only purchase_url still missing
            assert_eq!(session.phase, SessionPhase::MissingFields);
            assert_eq!(
                session.validation.missing_required,
                vec![RequiredField::PurchaseUrl]
            );
            // Transcript accumulated across rounds
            assert_eq!(
                session.transcript.as_deref(),
                Some("a widget\n\nAdditional details: five of them at $9.99")
            );
        })
        .await;

    // The second extraction ran on the concatenated transcript
    let seen = extractor_handle.seen_text.lock().await;
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], "a widget");
    assert_eq!(seen[1], "a widget\n\nAdditional details: five of them at $9.99");
}

#[tokio::test]
async fn supplemental_round_reuses_original_images() {
    let transcriber = ScriptedTranscriber::new(vec![
        Ok("a widget".to_string()),
        Ok("more details".to_string()),
    ]);
    let extractor = ScriptedExtractor::new(vec![
        Ok(ExtractedFormData {
            name: Some("Widget".to_string()),
            ..Default::default()
        }),
        Ok(ExtractedFormData {
            quantity: Some(1),
            purchase_price: Some(1.0),
            purchase_url: Some("http://a".to_string()),
            ..Default::default()
        }),
    ]);
    let extractor_handle = extractor.clone();
    let harness = Harness::new(transcriber, extractor).await;

    // Stage two photos before confirming
    {
        let mut sessions = harness.sessions.write().await;
        let session = sessions.get_mut(&harness.session_id).unwrap();
        session
            .images
            .stage(vec![0x89, 0x50, 0x4E, 0x47], "image/png".to_string())
            .unwrap();
        session
            .images
            .stage(vec![0xFF, 0xD8, 0xFF], "image/jpeg".to_string())
            .unwrap();
    }

    harness.apply(SessionEvent::ImagesConfirmed).await;
    harness.record().await;
    harness.apply(SessionEvent::RecordMore).await;
    harness.record().await;

    // Both rounds saw the full original image set
    let counts = extractor_handle.seen_image_counts.lock().await;
    assert_eq!(*counts, vec![2, 2]);

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::Complete);
        })
        .await;
}

#[tokio::test]
async fn rate_limited_transcription_lands_in_recoverable_error() {
    let transcriber = ScriptedTranscriber::new(vec![Err(AiServiceError::Api {
        status: 429,
        message: "Transcription is rate limited — wait a moment before trying again".to_string(),
    })]);
    let extractor = ScriptedExtractor::new(vec![]);
    let harness = Harness::new(transcriber, extractor).await;

    // Stage an image so we can check it survives "try again"
    {
        let mut sessions = harness.sessions.write().await;
        let session = sessions.get_mut(&harness.session_id).unwrap();
        session
            .images
            .stage(vec![0xFF, 0xD8, 0xFF], "image/jpeg".to_string())
            .unwrap();
    }

    harness.apply(SessionEvent::ImagesConfirmed).await;
    harness.record().await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::Error);
            let step = session
                .steps
                .iter()
                .find(|s| s.kind == StepKind::Transcribe)
                .unwrap();
            assert_eq!(step.status, StepStatus::Failed);
            assert!(step.error.as_deref().unwrap().contains("rate limited"));
            // Extraction never started
            let extract_step = session
                .steps
                .iter()
                .find(|s| s.kind == StepKind::Extract)
                .unwrap();
            assert_eq!(extract_step.status, StepStatus::Pending);
        })
        .await;

    harness.apply(SessionEvent::TryAgain).await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::Voice);
            assert_eq!(session.images.len(), 1);
            assert!(session.transcript.is_none());
            assert!(session.error.is_none());
            assert_eq!(session.data, ExtractedFormData::default());
        })
        .await;
}

#[tokio::test]
async fn blank_transcript_is_a_no_speech_failure() {
    let transcriber = ScriptedTranscriber::new(vec![Ok("   \n ".to_string())]);
    let extractor = ScriptedExtractor::new(vec![]);
    let harness = Harness::new(transcriber, extractor).await;

    harness.apply(SessionEvent::ImagesConfirmed).await;
    harness.record().await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::Error);
            assert!(session
                .error
                .as_deref()
                .unwrap()
                .contains("No speech detected"));
        })
        .await;
}

#[tokio::test]
async fn failed_extraction_marks_only_the_extract_step() {
    let transcriber = ScriptedTranscriber::new(vec![Ok("a widget".to_string())]);
    let extractor = ScriptedExtractor::new(vec![Err(AiServiceError::Parse(
        "no JSON object in model reply".to_string(),
    ))]);
    let harness = Harness::new(transcriber, extractor).await;

    harness.apply(SessionEvent::ImagesConfirmed).await;
    harness.record().await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::Error);
            let transcribe = session
                .steps
                .iter()
                .find(|s| s.kind == StepKind::Transcribe)
                .unwrap();
            assert_eq!(transcribe.status, StepStatus::Completed);
            assert_eq!(transcribe.output.as_deref(), Some("a widget"));

            let extract = session
                .steps
                .iter()
                .find(|s| s.kind == StepKind::Extract)
                .unwrap();
            assert_eq!(extract.status, StepStatus::Failed);
            assert!(extract
                .error
                .as_deref()
                .unwrap()
                .contains("Failed to parse AI response"));
        })
        .await;
}

#[tokio::test]
async fn start_over_releases_previews_and_abandon_releases_once() {
    let transcriber = ScriptedTranscriber::new(vec![]);
    let extractor = ScriptedExtractor::new(vec![]);
    let harness = Harness::new(transcriber, extractor).await;

    {
        let mut sessions = harness.sessions.write().await;
        let session = sessions.get_mut(&harness.session_id).unwrap();
        session
            .images
            .stage(vec![0xFF, 0xD8, 0xFF], "image/jpeg".to_string())
            .unwrap();
        session
            .images
            .stage(vec![0x89, 0x50, 0x4E, 0x47], "image/png".to_string())
            .unwrap();
    }

    harness.apply(SessionEvent::StartOver).await;

    harness
        .with_session(|session| {
            assert_eq!(session.phase, SessionPhase::Images);
            assert!(session.images.is_empty());
        })
        .await;

    // Abandoning after the reset finds nothing left to release
    let mut sessions = harness.sessions.write().await;
    let session = sessions.get_mut(&harness.session_id).unwrap();
    assert_eq!(session.abandon(), 0);
}
