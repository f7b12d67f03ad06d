//! Candidate item form data produced by AI extraction
//!
//! **[PSA-EX-010]** Every field is optional: absence means "not yet known"
//! and is distinct from an explicit empty value. The extraction backend,
//! the merge engine and the validator all operate on this record.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an item's stock is tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Consumables and bulk parts counted by quantity
    Quantity,
    /// Uniquely identifiable / serialized equipment
    Individual,
}

/// A partial record of candidate item fields
///
/// Produced by the extraction backend, refined by supplemental recordings
/// and manual input, and finally handed to the item-creation flow. Unknown
/// fields in the model reply are ignored; missing fields deserialize to
/// `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedFormData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_mode: Option<TrackingMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// ISO date, YYYY-MM-DD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_date: Option<String>,
    /// ISO date, YYYY-MM-DD
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warranty_expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Set only when the model confidently matched an existing category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    /// Name for a category to create when no confident match exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_name_suggestion: Option<String>,
    /// Set only when the model confidently matched an existing vendor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<i64>,
    /// Name for a vendor to create when no confident match exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_name_suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifications: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datasheet_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Existing catalog entry offered to the extraction model for matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupEntry {
    pub id: i64,
    pub name: String,
}

/// Contextual lookup lists supplied to the extraction backend
///
/// The model may only reference `category_id`/`vendor_id` values present in
/// these lists; anything else becomes a `*_name_suggestion`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionContext {
    pub categories: Vec<LookupEntry>,
    pub vendors: Vec<LookupEntry>,
    pub existing_tags: Vec<String>,
}
