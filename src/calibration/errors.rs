//! Calibration error types
//!
//! Error codes:
//! - CAL_NOT_FOUND (REJECT)
//! - CAL_INVALID (REJECT)
//! - CAL_DUPLICATE_ID (REJECT)
//! - CAL_PROVIDER_FAILED (REJECT)
//! - CAL_SCHEMA_DEFINITION (FATAL)
//!
//! Field-level problems are collected into [`ValidationErrors`], never raised
//! one at a time. Load-level problems for one machine never abort a bulk load.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use super::schema::Range;
use super::units::{format_quantity, Unit};

/// Severity levels for calibration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The record (or machine) is rejected; other machines are unaffected
    Reject,
    /// The schema itself is wrong; nothing can be validated
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// One offending field in one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Field path (e.g. "tracks.2.over.wrist2")
    pub field: String,
    /// Value received, rendered in authored units; empty when there is no value to show
    pub value: String,
    /// Violated constraint
    pub constraint: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        value: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            constraint: constraint.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, "", "required field is missing")
    }

    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::new(field, "", "field is not declared in the calibration schema")
    }

    pub fn null_value(field: impl Into<String>) -> Self {
        Self::new(field, "null", "value must not be null")
    }

    pub fn type_mismatch(field: impl Into<String>, expected: &str, actual: &str) -> Self {
        Self::new(field, actual, format!("expected {}", expected))
    }

    pub fn out_of_range(field: impl Into<String>, value: f64, unit: Unit, range: &Range) -> Self {
        Self::new(field, format_quantity(value, unit), range.describe(unit))
    }

    pub fn not_finite(field: impl Into<String>, value: f64) -> Self {
        Self::new(field, value.to_string(), "value must be finite")
    }

    pub fn not_in_enum(field: impl Into<String>, value: &str, allowed: &[&str]) -> Self {
        Self::new(field, value, format!("must be one of {}", allowed.join(" | ")))
    }

    /// A declared slot with no depth offset.
    pub fn missing_slot(table: &str, slot: u32) -> Self {
        Self::new(format!("{}.{}", table, slot), "", format!("missing key {}", slot))
    }

    /// A depth offset for a slot outside the declared layout.
    pub fn extra_slot(table: &str, slot: u32, declared: &str) -> Self {
        Self::new(
            format!("{}.{}", table, slot),
            "",
            format!("unexpected key {}, declared slots are {}", slot, declared),
        )
    }

    /// Two authored keys that normalize to the same integer id.
    pub fn duplicate_key(table: &str, key: &str, id: u32) -> Self {
        Self::new(
            format!("{}.{}", table, id),
            key,
            format!("duplicate key, {} is already defined", id),
        )
    }

    /// A track with some but not all of its four stage poses.
    pub fn incomplete_track(track_path: impl Into<String>, present: &[&str], missing: &[&str]) -> Self {
        Self::new(
            track_path,
            format!("stages present: {}", present.join(", ")),
            format!("incomplete sequence, missing {}", missing.join(", ")),
        )
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}: {}", self.field, self.constraint)
        } else {
            write!(f, "{} = {}: {}", self.field, self.value, self.constraint)
        }
    }
}

/// Every field error found in one record. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub(crate) fn new(errors: Vec<FieldError>) -> Self {
        debug_assert!(!errors.is_empty());
        Self { errors }
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the errors reported for exactly this field path.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.errors.iter().filter(move |e| e.field == field)
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invalid field(s)", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

/// Failures raised by a record provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("I/O error on '{path}': {message}")]
    Io { path: PathBuf, message: String },

    #[error("malformed record '{path}': {message}")]
    Malformed { path: PathBuf, message: String },

    #[error("record file '{0}' already exists")]
    AlreadyExists(PathBuf),
}

/// Result type for record providers
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Failure to load one machine's calibration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("no calibration record for machine '{0}'")]
    NotFound(String),

    #[error("calibration for machine '{machine_id}' rejected: {errors}")]
    Invalid {
        machine_id: String,
        errors: ValidationErrors,
    },

    #[error("machine id '{0}' is provided by more than one record")]
    DuplicateId(String),

    #[error("record provider failed for '{context}': {source}")]
    Provider {
        context: String,
        #[source]
        source: ProviderError,
    },
}

impl LoadError {
    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::NotFound(_) => "CAL_NOT_FOUND",
            LoadError::Invalid { .. } => "CAL_INVALID",
            LoadError::DuplicateId(_) => "CAL_DUPLICATE_ID",
            LoadError::Provider { .. } => "CAL_PROVIDER_FAILED",
        }
    }

    /// Load errors only ever disqualify one machine.
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }

    /// Machine the error belongs to, if it concerns a single machine
    pub fn machine_id(&self) -> Option<&str> {
        match self {
            LoadError::NotFound(id) | LoadError::DuplicateId(id) => Some(id),
            LoadError::Invalid { machine_id, .. } => Some(machine_id),
            LoadError::Provider { .. } => None,
        }
    }

    /// Field errors for an `Invalid` result, empty otherwise
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            LoadError::Invalid { errors, .. } => errors.errors(),
            _ => &[],
        }
    }
}

/// Result type for loader operations
pub type LoadResult<T> = Result<T, LoadError>;

/// Programmer mistakes in a schema definition.
///
/// These never depend on record contents; the standard schema is checked by
/// the unit tests.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaDefinitionError {
    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("field '{0}' is not declared")]
    UnknownField(String),

    #[error("field '{field}' must be declared as {expected}, found {actual}")]
    KindMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("field '{field}' has invalid range [{min}, {max}]")]
    InvalidRange { field: String, min: f64, max: f64 },

    #[error("field '{field}' cannot convert {authored} into {canonical}")]
    UnitMismatch {
        field: String,
        authored: Unit,
        canonical: Unit,
    },

    #[error("field '{field}' has invalid pattern: {message}")]
    InvalidPattern { field: String, message: String },
}

impl SchemaDefinitionError {
    pub fn code(&self) -> &'static str {
        "CAL_SCHEMA_DEFINITION"
    }

    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_display_with_value() {
        let range = Range::symmetric(360.0);
        let err = FieldError::out_of_range("neutral.wrist2", 450.0, Unit::Degree, &range);
        assert_eq!(err.to_string(), "neutral.wrist2 = 450°: exceeds ±360°");
    }

    #[test]
    fn test_missing_slot_display() {
        let err = FieldError::missing_slot("slotDepthOffsets", 63);
        assert_eq!(err.field, "slotDepthOffsets.63");
        assert_eq!(err.to_string(), "slotDepthOffsets.63: missing key 63");
    }

    #[test]
    fn test_validation_errors_lists_every_field() {
        let errors = ValidationErrors::new(vec![
            FieldError::missing("speed"),
            FieldError::unknown_field("sped"),
        ]);
        let display = errors.to_string();
        assert!(display.starts_with("2 invalid field(s)"));
        assert!(display.contains("speed"));
        assert!(display.contains("sped"));
        assert_eq!(errors.for_field("sped").count(), 1);
    }

    #[test]
    fn test_load_error_codes() {
        assert_eq!(LoadError::NotFound("TAIF".into()).code(), "CAL_NOT_FOUND");
        assert_eq!(LoadError::DuplicateId("TAIF".into()).code(), "CAL_DUPLICATE_ID");
        let invalid = LoadError::Invalid {
            machine_id: "TAIF".into(),
            errors: ValidationErrors::new(vec![FieldError::missing("homeX")]),
        };
        assert_eq!(invalid.code(), "CAL_INVALID");
        assert_eq!(invalid.machine_id(), Some("TAIF"));
        assert_eq!(invalid.field_errors().len(), 1);
    }

    #[test]
    fn test_schema_definition_error_is_fatal() {
        let err = SchemaDefinitionError::UnknownField("sped".into());
        assert_eq!(err.severity(), Severity::Fatal);
        assert_eq!(err.code(), "CAL_SCHEMA_DEFINITION");
        assert!(err.to_string().contains("sped"));
    }
}
