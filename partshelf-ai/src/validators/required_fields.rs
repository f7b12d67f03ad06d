//! Required-field validation for extracted item data
//!
//! **[PSA-VAL-010]** An extraction is usable without user override only
//! when all four required fields carry a value. Zero is a value; `None`
//! and the empty string are not.

use crate::models::ExtractedFormData;
use serde::Serialize;

/// The fields the product considers essential before an extraction is
/// usable without an explicit "apply anyway"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredField {
    Name,
    Quantity,
    PurchasePrice,
    PurchaseUrl,
}

impl RequiredField {
    /// Fixed iteration order; also the order missing fields are presented
    /// to the user for manual entry.
    pub const ALL: [RequiredField; 4] = [
        RequiredField::Name,
        RequiredField::Quantity,
        RequiredField::PurchasePrice,
        RequiredField::PurchaseUrl,
    ];

    /// Wire/form key for this field
    pub fn key(&self) -> &'static str {
        match self {
            RequiredField::Name => "name",
            RequiredField::Quantity => "quantity",
            RequiredField::PurchasePrice => "purchase_price",
            RequiredField::PurchaseUrl => "purchase_url",
        }
    }

    /// Human label for manual-entry prompts
    pub fn label(&self) -> &'static str {
        match self {
            RequiredField::Name => "Name",
            RequiredField::Quantity => "Quantity",
            RequiredField::PurchasePrice => "Purchase price",
            RequiredField::PurchaseUrl => "Purchase URL",
        }
    }
}

/// Derived validation outcome; recomputed after every change to the
/// underlying data, never mutated directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionValidation {
    /// Missing required fields in fixed `RequiredField::ALL` order
    pub missing_required: Vec<RequiredField>,
    /// Human labels for the same fields, same order
    pub missing_labels: Vec<String>,
    /// True iff no required field is missing
    pub is_complete: bool,
}

/// Compute which required fields are still missing.
///
/// A field is missing iff its value is absent or, for strings, empty.
/// `quantity = 0` and `purchase_price = 0` are explicit values, not
/// missing.
pub fn validate(data: &ExtractedFormData) -> ExtractionValidation {
    let mut missing_required = Vec::new();

    for field in RequiredField::ALL {
        let missing = match field {
            RequiredField::Name => is_blank(&data.name),
            RequiredField::Quantity => data.quantity.is_none(),
            RequiredField::PurchasePrice => data.purchase_price.is_none(),
            RequiredField::PurchaseUrl => is_blank(&data.purchase_url),
        };
        if missing {
            missing_required.push(field);
        }
    }

    let missing_labels = missing_required
        .iter()
        .map(|f| f.label().to_string())
        .collect();
    let is_complete = missing_required.is_empty();

    ExtractionValidation {
        missing_required,
        missing_labels,
        is_complete,
    }
}

fn is_blank(value: &Option<String>) -> bool {
    match value {
        Some(s) => s.is_empty(),
        None => true,
    }
}
