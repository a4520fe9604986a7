//! Validation engine: pure checks over request payloads.
//!
//! Every validator returns the full list of problems it found; an empty list
//! means the payload is well-formed. Nothing here touches the store.

pub mod notification;
pub mod plant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Character count of the trimmed value.
pub(crate) fn trimmed_len(value: &str) -> usize {
    value.trim().chars().count()
}

pub(crate) fn in_range<T: PartialOrd>(value: T, min: T, max: T) -> bool {
    value >= min && value <= max
}
