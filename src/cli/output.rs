//! CLI output formatting

use crate::core::error::FieldError;
use crate::core::schema::{OptionSource, ParameterDescriptor, ParameterKind, StepParameterSchema};
use crate::form::{FormEvent, LabelResolver, Notifier, OptionsState};
use crate::persistence::StoredStep;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");

/// Spinner shown while a save is in flight
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Toasts printed to the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn success(&self, message: &str) {
        println!("{} {}", CHECK, style(message).green());
    }

    fn error(&self, message: &str) {
        println!("{} {}", CROSS, style(message).red());
    }
}

/// Horizontal rule spanning the terminal
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width.min(100))
}

/// Render a value for display, masking secrets
pub fn format_value(field: &ParameterDescriptor, value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => style("-").dim().to_string(),
        Some(_) if field.kind == ParameterKind::Password => "********".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Short description of a field's rules
pub fn format_rules(field: &ParameterDescriptor) -> String {
    let mut rules = Vec::new();
    if field.required {
        rules.push("required".to_string());
    }
    let c = &field.constraints;
    if let Some(min) = c.min {
        rules.push(format!("min {}", min));
    }
    if let Some(max) = c.max {
        rules.push(format!("max {}", max));
    }
    if let Some(step) = c.step {
        rules.push(format!("step {}", step));
    }
    if let Some(max_length) = c.max_length {
        rules.push(format!("≤ {} chars", max_length));
    }
    if let Some(pattern) = &c.pattern {
        rules.push(format!("matches {}", pattern));
    }
    match &field.kind {
        ParameterKind::Select {
            options: OptionSource::Static(options),
        } => rules.push(format!(
            "one of {}",
            options.iter().map(|o| o.value.as_str()).collect::<Vec<_>>().join("|")
        )),
        ParameterKind::Select {
            options: OptionSource::Dictionary(dict),
        } => rules.push(format!("from dictionary {}", dict)),
        _ => {}
    }
    rules.join(", ")
}

/// Render a schema as a field table
pub fn format_schema(schema: &StepParameterSchema, labels: &dyn LabelResolver) -> String {
    let mut out = String::new();
    let title = schema
        .title_key
        .as_deref()
        .map(|k| labels.resolve(k))
        .unwrap_or_else(|| schema.step_type.clone());
    out.push_str(&format!("{} ({})\n", style(title).bold(), style(&schema.step_type).dim()));

    for field in schema.fields() {
        let default = field
            .default_value
            .as_ref()
            .map(|d| format!(" = {}", d))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {:<28} {:<9} {}{}  {}\n",
            style(&field.name).cyan(),
            field.kind.name(),
            labels.resolve(&field.label),
            style(default).dim(),
            style(format_rules(field)).dim()
        ));
        if let Some(description) = &field.description {
            out.push_str(&format!("  {:<28} {}\n", "", style(description).dim().italic()));
        }
    }
    out
}

/// Render the current values of a form
pub fn format_form(
    schema: &StepParameterSchema,
    values: &serde_json::Map<String, Value>,
    labels: &dyn LabelResolver,
) -> String {
    schema
        .fields()
        .map(|field| {
            format!(
                "  {:<32} {}",
                labels.resolve(&field.label),
                format_value(field, values.get(&field.name))
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render field errors, one per line
pub fn format_field_errors(errors: &[FieldError], labels: &dyn LabelResolver, schema: &StepParameterSchema) -> String {
    errors
        .iter()
        .map(|e| {
            let label = schema
                .field(&e.field)
                .map(|f| labels.resolve(&f.label))
                .unwrap_or_else(|| e.field.clone());
            format!("  {} {} {}", CROSS, style(label).red().bold(), e.issue)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a form event for display
pub fn format_form_event(event: &FormEvent) -> String {
    match event {
        FormEvent::Opened { step_id } => format!("{} Editing {}", INFO, style(step_id).cyan()),
        FormEvent::OptionsLoaded { field, count } => {
            format!("{} Loaded {} options for {}", INFO, count, style(field).cyan())
        }
        FormEvent::OptionsFailed { field, error } => format!(
            "{} Options for {} unavailable: {}",
            WARN,
            style(field).yellow(),
            style(error).dim()
        ),
        FormEvent::ValidationFailed { step_id, fields } => format!(
            "{} {} has invalid fields: {}",
            CROSS,
            style(step_id).red(),
            fields.join(", ")
        ),
        FormEvent::SaveStarted { step_id, request_id } => format!(
            "{} Saving {} ({})",
            SPINNER,
            style(step_id).cyan(),
            style(&request_id.to_string()[..8]).dim()
        ),
        FormEvent::Saved { step_id, .. } => format!("{} {} saved", CHECK, style(step_id).green()),
        FormEvent::SaveFailed { step_id, error } => {
            format!("{} {}: {}", CROSS, style(step_id).red(), style(error).dim())
        }
        FormEvent::Closed { step_id } => format!("{} Closed {}", INFO, style(step_id).dim()),
    }
}

/// Describe the options state of a select field
pub fn format_options_state(state: &OptionsState) -> String {
    match state {
        OptionsState::Loading => style("loading").dim().to_string(),
        OptionsState::Loaded(options) => options
            .iter()
            .map(|o| o.value.as_str())
            .collect::<Vec<_>>()
            .join("|"),
        OptionsState::Failed(error) => style(format!("unavailable ({})", error)).yellow().to_string(),
    }
}

/// One line per stored step
pub fn format_stored_step(step: &StoredStep) -> String {
    format!(
        "{} {} - {} - {} attrs - {}",
        CHECK,
        style(&step.step_code).cyan(),
        style(&step.step_title).bold(),
        step.step_attrs.len(),
        style(step.updated_at.to_rfc3339()).dim()
    )
}
