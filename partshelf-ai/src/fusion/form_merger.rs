//! Field-level merging of extracted item data
//!
//! **[PSA-MG-010]** Merge strategy: a field set in the fresh record
//! overwrites the prior value; a field the fresh record does not set is
//! preserved. For string fields an explicit empty string counts as unset
//! and never overwrites, matching the validator's emptiness rule.
//!
//! Both operations are pure and field-independent, which makes sequential
//! merges associative: merging A then B equals merging their field-level
//! union with B winning conflicts.

use crate::models::ExtractedFormData;
use serde::Deserialize;

/// Merge a fresh extraction into the prior record.
///
/// Used after a supplemental recording: the fresh extraction ran on the
/// concatenated transcript, but only fields it actually set may replace
/// what earlier rounds (or the user) established.
pub fn merge_extraction(
    prior: &ExtractedFormData,
    fresh: &ExtractedFormData,
) -> ExtractedFormData {
    ExtractedFormData {
        name: pick_string(&fresh.name, &prior.name),
        description: pick_string(&fresh.description, &prior.description),
        tracking_mode: pick(&fresh.tracking_mode, &prior.tracking_mode),
        quantity: pick(&fresh.quantity, &prior.quantity),
        min_quantity: pick(&fresh.min_quantity, &prior.min_quantity),
        unit: pick_string(&fresh.unit, &prior.unit),
        serial_number: pick_string(&fresh.serial_number, &prior.serial_number),
        asset_tag: pick_string(&fresh.asset_tag, &prior.asset_tag),
        condition: pick_string(&fresh.condition, &prior.condition),
        purchase_date: pick_string(&fresh.purchase_date, &prior.purchase_date),
        warranty_expiry: pick_string(&fresh.warranty_expiry, &prior.warranty_expiry),
        location: pick_string(&fresh.location, &prior.location),
        category_id: pick(&fresh.category_id, &prior.category_id),
        category_name_suggestion: pick_string(
            &fresh.category_name_suggestion,
            &prior.category_name_suggestion,
        ),
        vendor_id: pick(&fresh.vendor_id, &prior.vendor_id),
        vendor_name_suggestion: pick_string(
            &fresh.vendor_name_suggestion,
            &prior.vendor_name_suggestion,
        ),
        specifications: pick(&fresh.specifications, &prior.specifications),
        tags: pick(&fresh.tags, &prior.tags),
        purchase_price: pick(&fresh.purchase_price, &prior.purchase_price),
        purchase_currency: pick_string(&fresh.purchase_currency, &prior.purchase_currency),
        purchase_url: pick_string(&fresh.purchase_url, &prior.purchase_url),
        datasheet_url: pick_string(&fresh.datasheet_url, &prior.datasheet_url),
        notes: pick_string(&fresh.notes, &prior.notes),
    }
}

/// User-typed values for the currently-missing required fields
///
/// Deserialized from the manual-entry form; blank strings are dropped by
/// [`ManualFieldInputs::sanitized`] before any merge so they never
/// overwrite an extracted value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ManualFieldInputs {
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub purchase_price: Option<f64>,
    pub purchase_url: Option<String>,
}

impl ManualFieldInputs {
    /// Drop blank string inputs (a field the user left empty is "no input",
    /// not "set to empty")
    pub fn sanitized(&self) -> Self {
        Self {
            name: drop_blank(&self.name),
            quantity: self.quantity,
            purchase_price: self.purchase_price,
            purchase_url: drop_blank(&self.purchase_url),
        }
    }

    /// Accumulate newer inputs over these, field by field
    ///
    /// Retained inputs are re-applied after each supplemental extraction so
    /// a later model pass cannot clobber what the user typed.
    pub fn absorb(&mut self, newer: &ManualFieldInputs) {
        let newer = newer.sanitized();
        if newer.name.is_some() {
            self.name = newer.name;
        }
        if newer.quantity.is_some() {
            self.quantity = newer.quantity;
        }
        if newer.purchase_price.is_some() {
            self.purchase_price = newer.purchase_price;
        }
        if newer.purchase_url.is_some() {
            self.purchase_url = newer.purchase_url;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.quantity.is_none()
            && self.purchase_price.is_none()
            && self.purchase_url.is_none()
    }
}

/// Apply manual user input over extracted data.
///
/// Same precedence rule as [`merge_extraction`], restricted to the
/// required fields the manual form offers.
pub fn apply_manual(data: &ExtractedFormData, manual: &ManualFieldInputs) -> ExtractedFormData {
    let manual = manual.sanitized();
    ExtractedFormData {
        name: pick_string(&manual.name, &data.name),
        quantity: pick(&manual.quantity, &data.quantity),
        purchase_price: pick(&manual.purchase_price, &data.purchase_price),
        purchase_url: pick_string(&manual.purchase_url, &data.purchase_url),
        ..data.clone()
    }
}

/// Fresh wins when set; empty string is unset
fn pick_string(fresh: &Option<String>, prior: &Option<String>) -> Option<String> {
    match fresh {
        Some(s) if !s.is_empty() => Some(s.clone()),
        _ => prior.clone(),
    }
}

/// Fresh wins when present
fn pick<T: Clone>(fresh: &Option<T>, prior: &Option<T>) -> Option<T> {
    match fresh {
        Some(v) => Some(v.clone()),
        None => prior.clone(),
    }
}

fn drop_blank(value: &Option<String>) -> Option<String> {
    match value {
        Some(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
