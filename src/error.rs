//! Error taxonomy shared by every stage of the pipeline.
//!
//! All variants are terminal for the current declaration: validation is
//! fail-fast and nothing reaches the manifest once one of these surfaces.

use thiserror::Error;

pub type SynthResult<T> = Result<T, SynthError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SynthError {
    #[error("missing required attribute `{field}`")]
    MissingRequiredAttribute { field: String },

    #[error("attribute `{field}`: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("attribute `{field}`: {constraint} (got {value})")]
    ConstraintViolation {
        field: String,
        constraint: String,
        value: String,
    },

    #[error("attribute `{field}`: {value} is not one of [{}]", allowed.join(", "))]
    InvalidEnumValue {
        field: String,
        allowed: Vec<String>,
        value: String,
    },

    #[error("{description}")]
    CrossFieldInvariantViolation { description: String },

    #[error("resource `{kind}.{name}` is already defined")]
    DuplicateResourceDefinition { kind: String, name: String },

    #[error("unknown attribute `{field}`")]
    UnknownAttribute { field: String },

    #[error("unknown resource kind `{kind}`")]
    UnknownResourceKind { kind: String },

    #[error("invalid resource name `{name}`: {reason}")]
    InvalidResourceName { name: String, reason: String },

    #[error("at JSON path {path} → {message}")]
    Document { path: String, message: String },

    #[error("line {line}: {error}")]
    Line { line: usize, error: Box<SynthError> },
}

impl SynthError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingRequiredAttribute { field: field.into() }
    }

    pub fn mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        value: &serde_json::Value,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: json_kind(value).to_string(),
        }
    }

    pub fn constraint(
        field: impl Into<String>,
        constraint: impl Into<String>,
        value: &serde_json::Value,
    ) -> Self {
        Self::ConstraintViolation {
            field: field.into(),
            constraint: constraint.into(),
            value: value.to_string(),
        }
    }

    pub fn invariant(description: impl Into<String>) -> Self {
        Self::CrossFieldInvariantViolation { description: description.into() }
    }

    /// The attribute path the error points at, when there is one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingRequiredAttribute { field }
            | Self::TypeMismatch { field, .. }
            | Self::ConstraintViolation { field, .. }
            | Self::InvalidEnumValue { field, .. }
            | Self::UnknownAttribute { field } => Some(field),
            Self::Line { error, .. } => error.field(),
            _ => None,
        }
    }
}

/// Human name of a JSON value's kind, used in mismatch messages.
pub fn json_kind(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
