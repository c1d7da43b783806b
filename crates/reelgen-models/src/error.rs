//! Structural error types for plans and templates.

use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;
pub type PlanResult<T> = Result<T, PlanError>;

/// A render template document that cannot be made render-ready.
///
/// Every variant is a structural error: the document is malformed in a way
/// no repair round can fix, so callers fail the request immediately.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("Template is not a JSON object")]
    NotAnObject,

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Field '{0}' must be a sequence")]
    NotASequence(String),

    #[error("Unknown element type '{kind}' at {path}")]
    UnknownElementType { kind: String, path: String },

    #[error("Top-level element {index} must be a composition, found '{kind}'")]
    UnexpectedTopLevelElement { index: usize, kind: String },

    #[error(
        "Template must be portrait 1080x1920 for vertical video, got {width}x{height}"
    )]
    InvalidDimensions { width: u32, height: u32 },
}

impl TemplateError {
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_a_sequence(field: impl Into<String>) -> Self {
        Self::NotASequence(field.into())
    }
}

/// A scene plan that violates its structural invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("Scene plan has no scenes")]
    Empty,
}
