//! Error taxonomy for the intake flow.
//!
//! Validation failures are data ([`ValidationError`]) stored in flow state and
//! shown next to the field. [`FlowError`] and [`CatalogError`] are wiring bugs:
//! a caller addressing a step that does not exist, an answer of the wrong
//! shape, or a malformed step catalog.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{InputKind, StepId};

/// Why an answer was rejected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// Required step left empty
    Required,
    /// Text shorter than the step minimum
    TooShort { min: usize },
    /// Text longer than the step maximum
    TooLong { max: usize },
    /// Value (or a member of a set) is not one of the options
    InvalidSelection,
    /// More selections than the step allows
    TooManySelections { max: usize },
    /// Numeric entry could not be parsed
    NotANumber,
    /// Number below the inclusive minimum
    BelowMinimum { min: f64 },
    /// Number above the inclusive maximum
    AboveMaximum { max: f64 },
    /// Rejected by the step's custom check
    Custom { check: String },
    /// Answer shape does not match the step's input kind
    Malformed,
}

/// A rejected answer, attributed to the step's domain field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub kind: ValidationErrorKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self.kind, ValidationErrorKind::Required)
    }

    /// Length, selection-count or numeric bound violations
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(
            self.kind,
            ValidationErrorKind::TooShort { .. }
                | ValidationErrorKind::TooLong { .. }
                | ValidationErrorKind::TooManySelections { .. }
                | ValidationErrorKind::BelowMinimum { .. }
                | ValidationErrorKind::AboveMaximum { .. }
        )
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Misuse of the flow controller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error("step index {index} is out of range (flow has {len} steps)")]
    StepOutOfRange { index: usize, len: usize },

    #[error("step '{field}' expects a {expected} answer, got {found}")]
    AnswerKindMismatch {
        field: String,
        expected: InputKind,
        found: &'static str,
    },
}

/// Structural problems in a step catalog
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CatalogError {
    #[error("catalog has no steps")]
    Empty,

    #[error("step id {0} is used more than once")]
    DuplicateId(StepId),

    #[error("field '{0}' is used by more than one step")]
    DuplicateField(String),

    #[error("step '{0}' has an empty field name")]
    MissingField(StepId),

    #[error("step '{field}' is a {kind} step but declares no options")]
    MissingOptions { field: String, kind: InputKind },

    #[error("step '{field}' lists option '{option}' more than once")]
    DuplicateOption { field: String, option: String },

    #[error("step '{field}' has inverted bounds: {detail}")]
    InvertedBounds { field: String, detail: String },

    #[error("step '{0}' allows zero selections")]
    ZeroSelections(String),

    #[error("branch on step '{field}' refers to unknown option '{value}'")]
    UnknownBranchValue { field: String, value: String },

    #[error("branch on step '{0}' opens no steps")]
    EmptyBranch(String),

    #[error("branch sub-step '{0}' declares its own branch; nesting is not supported")]
    NestedBranch(String),

    #[error("failed to read catalog file: {0}")]
    Io(String),

    #[error("failed to parse catalog file: {0}")]
    Parse(String),
}
