//! Field validation against a step schema

use crate::core::error::{FieldError, FieldIssue, ValidationError};
use crate::core::graph::Attrs;
use crate::core::patch::AttributePatch;
use crate::core::schema::{OptionSource, ParameterDescriptor, ParameterKind, SelectOption, StepParameterSchema};
use regex::Regex;
use serde_json::{Number, Value};
use std::collections::HashMap;
use tracing::warn;

/// Options fetched for dictionary-backed fields, keyed by field name
pub type LoadedOptions = HashMap<String, Vec<SelectOption>>;

/// Validate form values and produce the patch to persist
///
/// Every failing field is reported, not only the first one. Optional fields
/// without a value are left out of the patch.
pub fn validate(
    schema: &StepParameterSchema,
    values: &Attrs,
    options: &LoadedOptions,
) -> Result<AttributePatch, ValidationError> {
    let mut attrs = Attrs::new();
    let mut errors = Vec::new();

    for field in schema.fields() {
        let raw = values.get(&field.name).filter(|v| !is_blank(v));

        let Some(raw) = raw else {
            if field.required {
                errors.push(FieldError {
                    field: field.name.clone(),
                    issue: FieldIssue::Missing,
                });
            }
            continue;
        };

        match check_field(field, raw, options.get(&field.name)) {
            Ok(value) => {
                attrs.insert(field.name.clone(), value);
            }
            Err(issue) => errors.push(FieldError {
                field: field.name.clone(),
                issue,
            }),
        }
    }

    if errors.is_empty() {
        Ok(AttributePatch::new(attrs))
    } else {
        Err(ValidationError { fields: errors })
    }
}

/// Convert user-typed text into a value of the field's kind
///
/// Unparseable input is kept as text so that validation can report it.
pub fn coerce_text(kind: &ParameterKind, text: &str) -> Value {
    let trimmed = text.trim();
    match kind {
        ParameterKind::Number => parse_number(trimmed)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
        ParameterKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Value::Bool(true),
            "false" | "no" | "off" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        _ => Value::String(text.to_string()),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn check_field(
    field: &ParameterDescriptor,
    raw: &Value,
    loaded: Option<&Vec<SelectOption>>,
) -> Result<Value, FieldIssue> {
    let constraints = &field.constraints;

    match &field.kind {
        ParameterKind::Text | ParameterKind::Password => {
            let text = raw.as_str().ok_or(FieldIssue::WrongType { expected: "text" })?;

            if let Some(max) = constraints.max_length {
                let actual = text.chars().count();
                if actual > max {
                    return Err(FieldIssue::TooLong { max, actual });
                }
            }

            if let Some(pattern) = &constraints.pattern {
                match Regex::new(pattern) {
                    Ok(regex) if !regex.is_match(text) => {
                        return Err(FieldIssue::PatternMismatch {
                            pattern: pattern.clone(),
                        });
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Ignoring invalid pattern on field {}: {}", field.name, e),
                }
            }

            Ok(Value::String(text.to_string()))
        }
        ParameterKind::Number => {
            let number = match raw {
                Value::Number(n) => n.clone(),
                Value::String(s) => parse_number(s.trim()).ok_or(FieldIssue::NotANumber)?,
                _ => return Err(FieldIssue::NotANumber),
            };
            let as_f64 = number.as_f64().ok_or(FieldIssue::NotANumber)?;

            if let Some(min) = constraints.min {
                if as_f64 < min {
                    return Err(FieldIssue::BelowMin { min });
                }
            }
            if let Some(max) = constraints.max {
                if as_f64 > max {
                    return Err(FieldIssue::AboveMax { max });
                }
            }

            Ok(Value::Number(number))
        }
        ParameterKind::Boolean => match raw {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(FieldIssue::NotABoolean),
            },
            _ => Err(FieldIssue::NotABoolean),
        },
        ParameterKind::Select { options } => {
            let value = raw.as_str().ok_or(FieldIssue::WrongType { expected: "an option" })?;

            let choices = match options {
                OptionSource::Static(choices) => Some(choices),
                OptionSource::Dictionary(_) => loaded,
            };

            // Dictionary fields whose options failed to load accept any value
            if let Some(choices) = choices {
                if !choices.iter().any(|c| c.value == value) {
                    return Err(FieldIssue::NotAnOption {
                        value: value.to_string(),
                    });
                }
            }

            Ok(Value::String(value.to_string()))
        }
    }
}

/// Parse a number, keeping integers integral
pub(crate) fn parse_number(text: &str) -> Option<Number> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}
