//! Extraction endpoint
//!
//! POST /ai/extract: JSON body with transcript text, base64 images and
//! catalog lookup lists. 400 on empty text or undecodable image; 503 when
//! the AI credential is absent; 500 with the mapped message otherwise.

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{ExtractedFormData, ExtractionContext, LookupEntry};
use crate::services::encode_all;
use crate::AppState;

/// POST /ai/extract request
#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub categories: Vec<LookupEntry>,
    #[serde(default)]
    pub vendors: Vec<LookupEntry>,
    #[serde(default, alias = "existingTags")]
    pub existing_tags: Vec<String>,
}

pub async fn extract_item(
    State(state): State<AppState>,
    Json(request): Json<ExtractRequest>,
) -> ApiResult<Json<ExtractedFormData>> {
    let extractor = state.extractor.clone().ok_or_else(|| {
        ApiError::ServiceUnavailable("AI features not configured".to_string())
    })?;

    if request.text.is_empty() {
        return Err(ApiError::BadRequest("text is required".to_string()));
    }

    // Each image must be independently base64-decodable
    let mut payloads = Vec::with_capacity(request.images.len());
    for (index, image) in request.images.iter().enumerate() {
        let bytes = BASE64.decode(image).map_err(|_| {
            ApiError::BadRequest(format!("images[{}] is not valid base64", index))
        })?;
        payloads.push(bytes);
    }
    let encoded = encode_all(&payloads);

    let context = ExtractionContext {
        categories: request.categories,
        vendors: request.vendors,
        existing_tags: request.existing_tags,
    };

    let data = match extractor.extract(&request.text, &encoded, &context).await {
        Ok(data) => data,
        Err(e) => {
            state.record_error(&e.to_string()).await;
            return Err(e.into());
        }
    };

    Ok(Json(data))
}
