//! Staged, not-yet-persisted images for an extraction session
//!
//! **[PSA-IMG-010]** Images live only in session memory until the final
//! "apply" hands them to the item-creation flow. While the list is
//! non-empty exactly one image is primary. Each image owns a preview
//! resource that must be released exactly once: on removal, on reset, or
//! never locally when ownership transfers on apply.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Default cap on staged images per session
pub const MAX_STAGED_IMAGES: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("Image limit reached ({0} max)")]
    LimitReached(usize),
    #[error("Image payload is empty")]
    EmptyPayload,
}

/// Locally renderable preview resource for a staged image
///
/// Held behind `Option` so release-by-`take` is structurally exactly-once.
#[derive(Debug)]
pub struct ImagePreview {
    pub id: Uuid,
}

/// A staged image: raw bytes plus a preview handle and primary flag
#[derive(Debug)]
pub struct TempImage {
    pub id: Uuid,
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub is_primary: bool,
    preview: Option<ImagePreview>,
}

impl TempImage {
    fn new(bytes: Vec<u8>, mime_type: String) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            bytes,
            mime_type,
            is_primary: false,
            preview: Some(ImagePreview { id }),
        }
    }

    /// Release the preview resource. Returns true the first time only.
    pub fn release_preview(&mut self) -> bool {
        self.preview.take().is_some()
    }

    /// Whether the preview resource is still held
    pub fn has_preview(&self) -> bool {
        self.preview.is_some()
    }
}

/// Wire-facing description of a staged image
#[derive(Debug, Clone, Serialize)]
pub struct StagedImageInfo {
    pub id: Uuid,
    pub mime_type: String,
    pub is_primary: bool,
    pub size_bytes: usize,
}

/// The session's staged-image list
///
/// Enforces the cap and the one-primary invariant; owns preview release.
#[derive(Debug, Default)]
pub struct ImageStage {
    images: Vec<TempImage>,
}

impl ImageStage {
    pub fn new() -> Self {
        Self { images: Vec::new() }
    }

    /// Stage a new image. The first staged image becomes primary.
    pub fn stage(&mut self, bytes: Vec<u8>, mime_type: String) -> Result<&TempImage, StageError> {
        if bytes.is_empty() {
            return Err(StageError::EmptyPayload);
        }
        if self.images.len() >= MAX_STAGED_IMAGES {
            return Err(StageError::LimitReached(MAX_STAGED_IMAGES));
        }

        let mut image = TempImage::new(bytes, mime_type);
        image.is_primary = self.images.is_empty();
        self.images.push(image);
        Ok(self.images.last().expect("just pushed"))
    }

    /// Remove an image and release its preview.
    ///
    /// If the removed image was primary and others remain, the first
    /// remaining image becomes primary.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let Some(index) = self.images.iter().position(|i| i.id == id) else {
            return false;
        };

        let mut removed = self.images.remove(index);
        removed.release_preview();

        if removed.is_primary {
            if let Some(first) = self.images.first_mut() {
                first.is_primary = true;
            }
        }
        true
    }

    /// Mark one image primary, clearing the flag on all others
    pub fn set_primary(&mut self, id: Uuid) -> bool {
        if !self.images.iter().any(|i| i.id == id) {
            return false;
        }
        for image in &mut self.images {
            image.is_primary = image.id == id;
        }
        true
    }

    pub fn get(&self, id: Uuid) -> Option<&TempImage> {
        self.images.iter().find(|i| i.id == id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TempImage> {
        self.images.iter()
    }

    /// Raw payloads in staging order (for extraction encoding)
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.images.iter().map(|i| i.bytes.clone()).collect()
    }

    pub fn infos(&self) -> Vec<StagedImageInfo> {
        self.images
            .iter()
            .map(|i| StagedImageInfo {
                id: i.id,
                mime_type: i.mime_type.clone(),
                is_primary: i.is_primary,
                size_bytes: i.bytes.len(),
            })
            .collect()
    }

    /// Release every preview and drop the images (reset / abandonment).
    /// Returns how many previews were actually released.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for image in &mut self.images {
            if image.release_preview() {
                released += 1;
            }
        }
        self.images.clear();
        released
    }

    /// Transfer the staged images out without releasing previews.
    ///
    /// Used on apply: the item-creation flow becomes responsible for
    /// uploading the bytes and eventually releasing the previews.
    pub fn take_all(&mut self) -> Vec<TempImage> {
        std::mem::take(&mut self.images)
    }
}
