//! HTTP API integration tests
//!
//! Exercises the router with in-memory requests (tower oneshot): the
//! service endpoints' configuration gating and input validation, and the
//! full session workflow over HTTP with stubbed AI backends.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use partshelf_common::events::EventBus;

use partshelf_ai::models::{ExtractedFormData, ExtractionContext};
use partshelf_ai::services::{AiServiceError, EncodedImage, Extractor, Transcriber};
use partshelf_ai::{build_router, AppState};

/// Fixed-outcome transcription stub
struct FixedTranscriber(&'static str);

#[async_trait::async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8], _mime_type: &str) -> Result<String, AiServiceError> {
        Ok(self.0.to_string())
    }
}

/// Fixed-outcome extraction stub
struct FixedExtractor(ExtractedFormData);

#[async_trait::async_trait]
impl Extractor for FixedExtractor {
    async fn extract(
        &self,
        _text: &str,
        _images: &[EncodedImage],
        _context: &ExtractionContext,
    ) -> Result<ExtractedFormData, AiServiceError> {
        Ok(self.0.clone())
    }
}

fn unconfigured_state() -> AppState {
    AppState::new(EventBus::new(16), None, None)
}

fn configured_state(transcript: &'static str, extracted: ExtractedFormData) -> AppState {
    AppState::new(
        EventBus::new(16),
        Some(Arc::new(FixedTranscriber(transcript))),
        Some(Arc::new(FixedExtractor(extracted))),
    )
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Build a single-field multipart body
fn multipart_request(uri: &str, field: &str, file_name: &str, content_type: &str, payload: &[u8]) -> Request<Body> {
    const BOUNDARY: &str = "partshelf-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn health_reports_ai_configuration() {
    let app = build_router(unconfigured_state());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["module"], "partshelf-ai");
    assert_eq!(body["ai_configured"], false);
}

#[tokio::test]
async fn transcribe_without_credential_is_503() {
    let app = build_router(unconfigured_state());
    let request = multipart_request("/ai/transcribe", "audio", "clip.webm", "audio/webm", &[1, 2]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "AI features not configured");
}

#[tokio::test]
async fn transcribe_rejects_non_audio_and_missing_file() {
    let state = configured_state("hello", ExtractedFormData::default());
    let app = build_router(state);

    let request = multipart_request("/ai/transcribe", "audio", "x.txt", "text/plain", b"hi");
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = multipart_request("/ai/transcribe", "other", "x.webm", "audio/webm", &[1]);
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn transcribe_returns_text() {
    let state = configured_state("three resistors", ExtractedFormData::default());
    let app = build_router(state);

    let request = multipart_request("/ai/transcribe", "audio", "clip.webm", "audio/webm", &[1, 2]);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["text"], "three resistors");
}

#[tokio::test]
async fn extract_validates_input() {
    let state = configured_state(
        "x",
        ExtractedFormData {
            name: Some("Arduino Uno".to_string()),
            ..Default::default()
        },
    );
    let app = build_router(state);

    // Empty text
    let response = app
        .clone()
        .oneshot(json_request("POST", "/ai/extract", json!({ "text": "" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Undecodable image
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/ai/extract",
            json!({ "text": "an arduino", "images": ["not base64!!"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Valid request
    let response = app
        .oneshot(json_request(
            "POST",
            "/ai/extract",
            json!({ "text": "an arduino" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["name"], "Arduino Uno");
}

#[tokio::test]
async fn extract_without_credential_is_503() {
    let app = build_router(unconfigured_state());
    let response = app
        .oneshot(json_request("POST", "/ai/extract", json!({ "text": "x" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

/// Poll session status until it leaves the processing phase
async fn wait_for_settled(app: &axum::Router, session_id: &str) -> Value {
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/ai/session/{}", session_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        if body["phase"] != "processing" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session never left the processing phase");
}

#[tokio::test]
async fn session_workflow_over_http_reaches_complete() {
    let state = configured_state(
        "Arduino Uno, qty 3, $24.99, http://shop/x",
        ExtractedFormData {
            name: Some("Arduino Uno".to_string()),
            quantity: Some(3),
            purchase_price: Some(24.99),
            purchase_url: Some("http://shop/x".to_string()),
            ..Default::default()
        },
    );
    let app = build_router(state);

    // Start a session with lookup context
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/ai/session",
            json!({
                "categories": [{ "id": 1, "name": "Microcontrollers" }],
                "vendors": [],
                "existing_tags": ["arduino"]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["phase"], "images");
    let session_id = body["session_id"].as_str().unwrap().to_string();

    // Stage a photo (sniffed as png)
    let png = [0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let response = app
        .clone()
        .oneshot(multipart_request(
            &format!("/ai/session/{}/images", session_id),
            "image",
            "photo.png",
            "application/octet-stream",
            &png,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body[0]["mime_type"], "image/png");
    assert_eq!(body[0]["is_primary"], true);

    // Continue to voice
    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/ai/session/{}/continue", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["phase"], "voice");

    // Deliver the recording
    let response = app
        .clone()
        .oneshot(multipart_request(
            &format!("/ai/session/{}/recording", session_id),
            "audio",
            "clip.webm",
            "audio/webm",
            &[1, 2, 3],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["phase"], "processing");

    // Wait for the background attempt
    let settled = wait_for_settled(&app, &session_id).await;
    assert_eq!(settled["phase"], "complete");
    assert_eq!(settled["validation"]["is_complete"], true);
    assert_eq!(settled["data"]["name"], "Arduino Uno");

    // Apply: data and staged image transfer out, session is gone
    let response = app
        .clone()
        .oneshot(
            Request::post(format!("/ai/session/{}/apply", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["form_data"]["quantity"], 3);
    assert_eq!(body["images"].as_array().unwrap().len(), 1);
    assert_eq!(body["images"][0]["is_primary"], true);

    let response = app
        .oneshot(
            Request::get(format!("/ai/session/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn recording_without_credential_is_503() {
    let app = build_router(unconfigured_state());

    let response = app
        .clone()
        .oneshot(json_request("POST", "/ai/session", json!({})))
        .await
        .unwrap();
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(multipart_request(
            &format!("/ai/session/{}/recording", session_id),
            "audio",
            "clip.webm",
            "audio/webm",
            &[1],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn recording_in_wrong_phase_is_conflict() {
    let state = configured_state("x", ExtractedFormData::default());
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/ai/session", json!({})))
        .await
        .unwrap();
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    // Still in the images phase: recording is rejected
    let response = app
        .oneshot(multipart_request(
            &format!("/ai/session/{}/recording", session_id),
            "audio",
            "clip.webm",
            "audio/webm",
            &[1],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn image_cap_is_enforced_over_http() {
    let state = configured_state("x", ExtractedFormData::default());
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/ai/session", json!({})))
        .await
        .unwrap();
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(multipart_request(
                &format!("/ai/session/{}/images", session_id),
                "image",
                "photo.jpg",
                "image/jpeg",
                &[0xFF, 0xD8, 0xFF],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(multipart_request(
            &format!("/ai/session/{}/images", session_id),
            "image",
            "photo.jpg",
            "image/jpeg",
            &[0xFF, 0xD8, 0xFF],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn abandon_reports_released_previews() {
    let state = configured_state("x", ExtractedFormData::default());
    let app = build_router(state);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/ai/session", json!({})))
        .await
        .unwrap();
    let session_id = body_json(response).await["session_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(multipart_request(
            &format!("/ai/session/{}/images", session_id),
            "image",
            "photo.jpg",
            "image/jpeg",
            &[0xFF, 0xD8, 0xFF],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::delete(format!("/ai/session/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["images_released"], 1);

    // Gone after abandonment
    let response = app
        .oneshot(
            Request::get(format!("/ai/session/{}", session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
