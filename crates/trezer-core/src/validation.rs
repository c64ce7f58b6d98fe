//! Field-level validation.
//!
//! Request bodies implement [`Validate`] after decoding. Failures are collected
//! into [`ValidationErrors`] and reported as a single validator fault with
//! every entry under the `validation` metadata key.

use crate::fault::Fault;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationEntry {
    /// Human-readable description of the failure.
    pub message: String,
    /// Field name as it appears in the payload.
    pub field: String,
    /// Fully qualified path of the field (`Body.race.id`).
    pub namespace: String,
    /// Name of the rule that failed (`required`, `uuid`, ...).
    pub tag: String,
    /// The offending value.
    pub value: Value,
}

/// Validation failures for one payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Error)]
#[error("validation failed on {} field(s)", .entries.len())]
pub struct ValidationErrors {
    /// Failed rules, in the order they were checked.
    pub entries: Vec<ValidationEntry>,
}

impl ValidationErrors {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed rule for a field of `type_name`.
    pub fn add(
        &mut self,
        type_name: &str,
        field: impl Into<String>,
        tag: impl Into<String>,
        value: impl Into<Value>,
    ) {
        let field = field.into();
        let tag = tag.into();
        let namespace = format!("{type_name}.{field}");
        self.entries.push(ValidationEntry {
            message: format!("Field validation for '{field}' failed on the '{tag}' tag"),
            field,
            namespace,
            tag,
            value: value.into(),
        });
    }

    /// Returns `true` if no rule failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of failed rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `Ok(())` when empty, `Err(self)` otherwise.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Post-decoding validation of a payload.
pub trait Validate {
    /// Checks every rule and returns all failures at once.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

impl Fault {
    /// Builds the `BAD_REQUEST` validator fault for a failed validation.
    #[must_use]
    pub fn validation(errors: ValidationErrors) -> Fault {
        let entries = serde_json::to_value(&errors.entries).unwrap_or(Value::Null);
        Fault::validator("BAD_REQUEST", "Validation failed")
            .meta("validation", entries)
            .cause(errors)
            .build()
    }
}
