//! Merge layer combining extraction rounds and manual input

mod form_merger;

pub use form_merger::{apply_manual, merge_extraction, ManualFieldInputs};
