//! Staged image encoding for extraction calls
//!
//! Local and deterministic: sniff the image type from header bytes and
//! produce base64 data URIs the multimodal endpoint accepts. Tracked as
//! its own processing step purely for user visibility.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// An image payload prepared for the extraction request
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime_type: &'static str,
    pub base64_data: String,
}

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            mime_type: sniff_image_mime(bytes),
            base64_data: BASE64.encode(bytes),
        }
    }

    /// `data:<mime>;base64,<payload>` form used in image_url parts
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.base64_data)
    }
}

/// Sniff the image MIME type from header bytes among jpeg/png/webp,
/// defaulting to jpeg when unrecognized.
pub fn sniff_image_mime(bytes: &[u8]) -> &'static str {
    match infer::get(bytes).map(|t| t.mime_type()) {
        Some("image/png") => "image/png",
        Some("image/webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Encode every staged payload in staging order
pub fn encode_all(payloads: &[Vec<u8>]) -> Vec<EncodedImage> {
    payloads.iter().map(|p| EncodedImage::from_bytes(p)).collect()
}
