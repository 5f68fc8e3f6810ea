//! Error types raised by the form core

use std::fmt;
use thiserror::Error;

/// Why a single field was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum FieldIssue {
    Missing,
    TooLong { max: usize, actual: usize },
    NotANumber,
    BelowMin { min: f64 },
    AboveMax { max: f64 },
    NotABoolean,
    PatternMismatch { pattern: String },
    NotAnOption { value: String },
    WrongType { expected: &'static str },
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldIssue::Missing => write!(f, "is required"),
            FieldIssue::TooLong { max, actual } => {
                write!(f, "is {} characters long, at most {} allowed", actual, max)
            }
            FieldIssue::NotANumber => write!(f, "must be a number"),
            FieldIssue::BelowMin { min } => write!(f, "must be at least {}", min),
            FieldIssue::AboveMax { max } => write!(f, "must be at most {}", max),
            FieldIssue::NotABoolean => write!(f, "must be true or false"),
            FieldIssue::PatternMismatch { pattern } => write!(f, "must match {}", pattern),
            FieldIssue::NotAnOption { value } => write!(f, "'{}' is not an available option", value),
            FieldIssue::WrongType { expected } => write!(f, "must be {}", expected),
        }
    }
}

/// A rejected field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub issue: FieldIssue,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.issue)
    }
}

/// Submitted values do not satisfy the step schema
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Invalid fields: {}", format_fields(.fields))]
pub struct ValidationError {
    /// Offending fields, in schema order
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field.as_str()).collect()
    }

    pub fn issue_for(&self, field: &str) -> Option<&FieldIssue> {
        self.fields.iter().find(|f| f.field == field).map(|f| &f.issue)
    }
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// The form cannot be opened for this node
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("Step '{0}' not found in job graph")]
    NodeNotFound(String),

    #[error("No parameter schema for step type '{0}'")]
    SchemaMissing(String),

    #[error("Step '{0}' has no type; cannot select a schema")]
    UnknownStepType(String),
}
