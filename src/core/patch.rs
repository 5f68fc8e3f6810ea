//! Attribute patches and save requests

use crate::core::graph::{Attrs, JobId};
use crate::core::schema::STEP_TITLE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Validated values of one step form, ready to replace the node's attrs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributePatch(Attrs);

impl AttributePatch {
    /// Build a patch; only validation produces these
    pub(crate) fn new(attrs: Attrs) -> Self {
        debug_assert!(attrs.contains_key(STEP_TITLE));
        Self(attrs)
    }

    pub fn step_title(&self) -> &str {
        self.0.get(STEP_TITLE).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Unit of work sent to the persistence boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Correlates log lines of one save; not part of the payload
    #[serde(skip, default = "Uuid::new_v4")]
    pub request_id: Uuid,

    #[serde(rename = "jobId")]
    pub job_id: JobId,

    /// The whole job graph, serialized verbatim
    #[serde(rename = "jobGraph")]
    pub job_graph: String,

    #[serde(rename = "stepCode")]
    pub step_code: String,

    #[serde(rename = "stepAttrs")]
    pub step_attrs: AttributePatch,
}

impl SaveRequest {
    pub fn new(job_id: JobId, job_graph: String, step_code: String, step_attrs: AttributePatch) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            job_id,
            job_graph,
            step_code,
            step_attrs,
        }
    }
}

/// Result reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SaveResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}
