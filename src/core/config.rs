//! Schema and message catalogs loaded from YAML

use crate::core::error::PreconditionError;
use crate::core::graph::GraphNode;
use crate::core::schema::{OptionSource, ParameterKind, StepParameterSchema, STEP_TITLE};
use crate::core::validation::{self, LoadedOptions};
use crate::form::LabelResolver;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Catalog shipped with the crate
const BUILTIN_CATALOG: &str = include_str!("../../schemas/catalog.yaml");

/// English labels shipped with the crate
const BUILTIN_MESSAGES: &str = include_str!("../../schemas/messages.en-US.yaml");

/// All known step schemas, as written in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    schemas: Vec<StepParameterSchema>,
}

impl SchemaCatalog {
    /// Load a catalog from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a catalog from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: SchemaCatalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// The step types bundled with this crate
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG)
    }

    /// Build a catalog in code
    pub fn from_schemas(schemas: Vec<StepParameterSchema>) -> Result<Self> {
        let catalog = Self { schemas };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate the catalog
    pub fn validate(&self) -> Result<()> {
        let mut seen_types = HashSet::new();
        for schema in &self.schemas {
            if !seen_types.insert(&schema.step_type) {
                anyhow::bail!("Duplicate step type: {}", schema.step_type);
            }

            let mut seen_names = HashSet::new();
            for param in &schema.parameters {
                if param.name == STEP_TITLE {
                    anyhow::bail!(
                        "Step type '{}' declares reserved parameter '{}'",
                        schema.step_type,
                        STEP_TITLE
                    );
                }
                if !seen_names.insert(&param.name) {
                    anyhow::bail!(
                        "Step type '{}' declares parameter '{}' twice",
                        schema.step_type,
                        param.name
                    );
                }

                let c = &param.constraints;
                if let (Some(min), Some(max)) = (c.min, c.max) {
                    if min > max {
                        anyhow::bail!(
                            "Parameter '{}.{}' has min {} greater than max {}",
                            schema.step_type,
                            param.name,
                            min,
                            max
                        );
                    }
                }
                if let Some(pattern) = &c.pattern {
                    if let Err(e) = regex::Regex::new(pattern) {
                        anyhow::bail!(
                            "Parameter '{}.{}' has an invalid pattern: {}",
                            schema.step_type,
                            param.name,
                            e
                        );
                    }
                }
                if let ParameterKind::Select {
                    options: OptionSource::Dictionary(dict_type),
                } = &param.kind
                {
                    if dict_type.trim().is_empty() {
                        anyhow::bail!(
                            "Parameter '{}.{}' names an empty dictionary type",
                            schema.step_type,
                            param.name
                        );
                    }
                }
            }

            // Defaults must pass their own rules, otherwise an untouched form could never be saved
            let mut probe = schema.defaults();
            probe.insert(STEP_TITLE.to_string(), serde_json::Value::String("probe".to_string()));
            if let Err(err) = validation::validate(schema, &probe, &LoadedOptions::new()) {
                for field in err.fields {
                    if probe.contains_key(&field.field) {
                        anyhow::bail!(
                            "Default of '{}.{}' is invalid: {}",
                            schema.step_type,
                            field.field,
                            field.issue
                        );
                    }
                }
            }
        }

        Ok(())
    }

    pub fn schema(&self, step_type: &str) -> Option<&StepParameterSchema> {
        self.schemas.iter().find(|s| s.step_type == step_type)
    }

    /// Schema for the given step type, or the precondition that blocks opening a form
    pub fn schema_for(&self, step_type: &str) -> Result<&StepParameterSchema, PreconditionError> {
        self.schema(step_type)
            .ok_or_else(|| PreconditionError::SchemaMissing(step_type.to_string()))
    }

    /// Schema matching a graph node's step kind
    pub fn schema_for_node(&self, node: &GraphNode) -> Result<&StepParameterSchema, PreconditionError> {
        let kind = node
            .step_kind()
            .ok_or_else(|| PreconditionError::UnknownStepType(node.id().to_string()))?;
        self.schema_for(&kind)
    }

    pub fn step_types(&self) -> impl Iterator<Item = &str> {
        self.schemas.iter().map(|s| s.step_type.as_str())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Localized strings keyed by message id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCatalog {
    messages: BTreeMap<String, String>,
}

impl MessageCatalog {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// English messages bundled with this crate
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_MESSAGES)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.messages.insert(key.into(), value.into());
    }
}

impl LabelResolver for MessageCatalog {
    fn resolve(&self, key: &str) -> String {
        self.messages
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
