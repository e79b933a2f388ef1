pub mod advice;
pub mod contract;
pub mod market;
pub mod portfolio;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single violated field constraint, e.g. `portfolio[1].shares: must be positive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Tickers are compared and stored trimmed and upper-cased.
pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_uppercase()
}
