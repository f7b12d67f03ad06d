//! Multimodal extraction API client
//!
//! **[PSA-INT-020]** Sends transcript text, optional photos and the
//! catalog lookup lists to the hosted multimodal endpoint and parses the
//! structured reply as [`ExtractedFormData`]. The reply is trusted as-is
//! beyond JSON parsing; which catalog entries count as a "confident match"
//! is model-internal.

use serde::Deserialize;
use std::time::Duration;

use crate::config::AiSettings;
use crate::models::{ExtractedFormData, ExtractionContext};
use crate::services::{friendly_status_message, AiServiceError, EncodedImage, Extractor};

const USER_AGENT: &str = "partshelf/0.1.0 (https://github.com/partshelf/partshelf)";
const SERVICE_LABEL: &str = "Extraction";

/// Chat-completions response envelope (only the parts we read)
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Multimodal extraction API client
pub struct ExtractionClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl ExtractionClient {
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
                model: settings.extraction_model.clone(),
            });

        Some(client)
    }
}

/// Build the system prompt embedding the catalog lookup lists
fn build_system_prompt(context: &ExtractionContext) -> String {
    let categories = serde_json::to_string(&context.categories).unwrap_or_else(|_| "[]".into());
    let vendors = serde_json::to_string(&context.vendors).unwrap_or_else(|_| "[]".into());
    let tags = serde_json::to_string(&context.existing_tags).unwrap_or_else(|_| "[]".into());

    format!(
        r#"You are the intake assistant of a home-lab inventory manager. The user describes an item they want to catalog, possibly with photos. Return ONE JSON object with any of these fields you can justify from the description or the photos (omit fields you cannot):

name, description, tracking_mode, quantity, min_quantity, unit, serial_number, asset_tag, condition, purchase_date, warranty_expiry, location, category_id, category_name_suggestion, vendor_id, vendor_name_suggestion, specifications (object mapping strings to strings), tags (array of strings), purchase_price, purchase_currency, purchase_url, datasheet_url, notes.

Rules:
- Always attempt values for name, quantity, purchase_price and purchase_url, inferring sensible values when the description implies them.
- tracking_mode is "individual" for uniquely-identifiable or serialized items and "quantity" for consumables and bulk parts.
- Set category_id only when the item confidently matches one of the existing categories below; otherwise omit it and set category_name_suggestion instead. Apply the same rule to vendor_id / vendor_name_suggestion.
- Dates must be ISO format, YYYY-MM-DD.
- Prefer existing tags when they fit.
- Output only the JSON object, no commentary.

Existing categories: {categories}
Existing vendors: {vendors}
Existing tags: {tags}"#
    )
}

/// Pull the JSON object out of the model reply.
///
/// With a JSON response format the reply is usually bare JSON, but models
/// occasionally wrap it in a fenced block.
fn extract_json_object(reply: &str) -> Result<&str, AiServiceError> {
    if let Some(start_marker) = reply.find("```json") {
        let start = start_marker + 7;
        if let Some(end_offset) = reply[start..].find("```") {
            return Ok(reply[start..start + end_offset].trim());
        }
    }

    if let Some(start) = reply.find('{') {
        if let Some(end) = reply.rfind('}') {
            if end >= start {
                return Ok(&reply[start..=end]);
            }
        }
    }

    Err(AiServiceError::Parse(
        "no JSON object in model reply".to_string(),
    ))
}

#[async_trait::async_trait]
impl Extractor for ExtractionClient {
    async fn extract(
        &self,
        text: &str,
        images: &[EncodedImage],
        context: &ExtractionContext,
    ) -> Result<ExtractedFormData, AiServiceError> {
        let url = format!("{}/chat/completions", self.api_base);

        // User content: the transcript plus one image_url part per photo
        let mut content = vec![serde_json::json!({ "type": "text", "text": text })];
        for image in images {
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": { "url": image.data_uri() }
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": build_system_prompt(context) },
                { "role": "user", "content": content }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.1
        });

        tracing::debug!(
            chars = text.len(),
            images = images.len(),
            categories = context.categories.len(),
            vendors = context.vendors.len(),
            "Requesting item extraction"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
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

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AiServiceError::Parse(e.to_string()))?;

        let reply = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| AiServiceError::Parse("reply has no choices".to_string()))?;

        let data: ExtractedFormData = serde_json::from_str(extract_json_object(reply)?)
            .map_err(|e| AiServiceError::Parse(e.to_string()))?;

        tracing::info!(
            name = ?data.name,
            has_quantity = data.quantity.is_some(),
            has_price = data.purchase_price.is_some(),
            "Extraction completed"
        );

        Ok(data)
    }
}
