//! Step parameter schemas
//!
//! A schema is static, per step type: an ordered list of parameter
//! descriptors. Validation rules live here as data so one form controller can
//! serve every step type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name of the synthetic title attribute present on every step
pub const STEP_TITLE: &str = "stepTitle";

/// Maximum length of a step title, in characters
pub const STEP_TITLE_MAX_LENGTH: usize = 120;

/// Label key of the step title field
pub const STEP_TITLE_LABEL: &str = "pages.project.di.step.stepTitle";

/// One choice of a select field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Where a select field gets its choices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionSource {
    /// Fixed list declared in the schema
    Static(Vec<SelectOption>),
    /// Fetched from the backend dictionary of this type when the form opens
    Dictionary(String),
}

/// Input kind of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParameterKind {
    Text,
    /// Text that is masked when displayed
    Password,
    Number,
    Boolean,
    Select { options: OptionSource },
}

impl ParameterKind {
    pub fn name(&self) -> &'static str {
        match self {
            ParameterKind::Text => "text",
            ParameterKind::Password => "password",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Select { .. } => "select",
        }
    }
}

/// Bounds checked on submit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Increment used when stepping a number up or down
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Regular expression a text value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Describes a single step parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,

    /// Message key of the field label
    pub label: String,

    #[serde(flatten)]
    pub kind: ParameterKind,

    #[serde(default)]
    pub required: bool,

    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub constraints: Constraints,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterDescriptor {
    pub fn builder(name: impl Into<String>) -> ParameterDescriptorBuilder {
        ParameterDescriptorBuilder::new(name)
    }

    /// The synthetic title field shared by all steps
    pub fn step_title() -> Self {
        ParameterDescriptor::builder(STEP_TITLE)
            .label(STEP_TITLE_LABEL)
            .required()
            .max_length(STEP_TITLE_MAX_LENGTH)
            .build()
    }

    /// Dictionary type backing this field, if any
    pub fn dictionary(&self) -> Option<&str> {
        match &self.kind {
            ParameterKind::Select {
                options: OptionSource::Dictionary(dict_type),
            } => Some(dict_type),
            _ => None,
        }
    }
}

/// Builder for [`ParameterDescriptor`]
#[derive(Debug, Clone)]
pub struct ParameterDescriptorBuilder {
    descriptor: ParameterDescriptor,
}

impl ParameterDescriptorBuilder {
    fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            descriptor: ParameterDescriptor {
                label: name.clone(),
                name,
                kind: ParameterKind::Text,
                required: false,
                default_value: None,
                constraints: Constraints::default(),
                description: None,
            },
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.descriptor.label = label.into();
        self
    }

    pub fn kind(mut self, kind: ParameterKind) -> Self {
        self.descriptor.kind = kind;
        self
    }

    pub fn required(mut self) -> Self {
        self.descriptor.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.descriptor.default_value = Some(value.into());
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.descriptor.constraints.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.descriptor.constraints.max = Some(max);
        self
    }

    pub fn step(mut self, step: f64) -> Self {
        self.descriptor.constraints.step = Some(step);
        self
    }

    pub fn max_length(mut self, max_length: usize) -> Self {
        self.descriptor.constraints.max_length = Some(max_length);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.descriptor.constraints.pattern = Some(pattern.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = Some(description.into());
        self
    }

    pub fn build(self) -> ParameterDescriptor {
        self.descriptor
    }
}

/// Ordered parameter list of one step type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepParameterSchema {
    /// Catalog key, e.g. `sink-iotdb`
    pub step_type: String,

    /// Message key of the form title
    #[serde(default)]
    pub title_key: Option<String>,

    /// Domain parameters; `stepTitle` is implied and not listed here
    pub parameters: Vec<ParameterDescriptor>,

    #[serde(skip, default = "ParameterDescriptor::step_title")]
    title_field: ParameterDescriptor,
}

impl StepParameterSchema {
    pub fn new(step_type: impl Into<String>, parameters: Vec<ParameterDescriptor>) -> Self {
        Self {
            step_type: step_type.into(),
            title_key: None,
            parameters,
            title_field: ParameterDescriptor::step_title(),
        }
    }

    /// Every field of the form in display order, title first
    pub fn fields(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        std::iter::once(&self.title_field).chain(self.parameters.iter())
    }

    pub fn field(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.fields().find(|p| p.name == name)
    }

    /// Domain parameter by name (never the title)
    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Attribute map for a freshly placed node
    pub fn defaults(&self) -> serde_json::Map<String, Value> {
        self.parameters
            .iter()
            .filter_map(|p| p.default_value.clone().map(|v| (p.name.clone(), v)))
            .collect()
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.fields()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Fields whose options come from a backend dictionary
    pub fn dictionary_fields(&self) -> Vec<(&str, &str)> {
        self.fields()
            .filter_map(|p| p.dictionary().map(|d| (p.name.as_str(), d)))
            .collect()
    }
}
