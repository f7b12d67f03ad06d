//! Validation layer for extracted item data

mod required_fields;

pub use required_fields::{validate, ExtractionValidation, RequiredField};
