//! Job graph model
//!
//! The canvas owns the graph layout; this crate only reads nodes and rewrites
//! one node's attributes. Each level keeps the JSON object it was read from,
//! so everything it does not understand is carried through untouched.

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Attribute map of a step, ordered as it was loaded
pub type Attrs = Map<String, Value>;

/// Identifier of the job owning a graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobId {
    Numeric(i64),
    Text(String),
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobId::Numeric(id) => write!(f, "{}", id),
            JobId::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        JobId::Numeric(id)
    }
}

impl From<i32> for JobId {
    fn from(id: i32) -> Self {
        JobId::Numeric(i64::from(id))
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        JobId::Text(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        JobId::Text(id)
    }
}

/// Step-specific payload of a node
///
/// Typed fields are views over the loaded document; serializing writes back
/// only the fields that changed, in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeData {
    /// Step category, e.g. `source` or `sink`
    pub step_type: Option<String>,

    /// Connector name, e.g. `IoTDB`
    pub name: Option<String>,

    /// Current parameter values
    pub attrs: Attrs,

    document: Map<String, Value>,
}

impl NodeData {
    pub fn new(step_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            step_type: Some(step_type.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl Serialize for NodeData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut document = self.document.clone();
        sync_text(&mut document, "type", self.step_type.as_deref());
        sync_text(&mut document, "name", self.name.as_deref());

        let current = document.get("attrs").and_then(Value::as_object);
        let unchanged = match current {
            Some(attrs) => *attrs == self.attrs,
            None => self.attrs.is_empty(),
        };
        if !unchanged {
            document.insert("attrs".to_string(), Value::Object(self.attrs.clone()));
        }

        document.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for NodeData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = Map::deserialize(deserializer)?;
        Ok(Self {
            step_type: text_of(&document, "type"),
            name: text_of(&document, "name"),
            attrs: document
                .get("attrs")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            document,
        })
    }
}

/// A step placed on the canvas
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    /// Unique within the graph; never rewritten here
    id: String,

    pub display_name: String,

    pub data: NodeData,

    document: Map<String, Value>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, data: NodeData) -> Self {
        let id = id.into();
        let mut document = Map::new();
        document.insert("id".to_string(), Value::String(id.clone()));
        Self {
            id,
            display_name: display_name.into(),
            data,
            document,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Catalog key for this node, `<type>-<name>` in lower case
    pub fn step_kind(&self) -> Option<String> {
        match (&self.data.step_type, &self.data.name) {
            (Some(t), Some(n)) => Some(format!("{}-{}", t, n).to_lowercase()),
            (Some(t), None) => Some(t.to_lowercase()),
            (None, Some(n)) => Some(n.to_lowercase()),
            (None, None) => None,
        }
    }

    /// Serialized attribute map
    pub fn attrs_json(&self) -> String {
        Value::Object(self.data.attrs.clone()).to_string()
    }
}

impl Serialize for GraphNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut document = self.document.clone();
        sync_text(&mut document, "displayName", Some(self.display_name.as_str()).filter(|n| !n.is_empty()));

        if document.contains_key("data") || self.data != NodeData::default() {
            let data = serde_json::to_value(&self.data).map_err(S::Error::custom)?;
            document.insert("data".to_string(), data);
        }

        document.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for GraphNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let document = Map::deserialize(deserializer)?;
        let id = text_of(&document, "id").ok_or_else(|| D::Error::missing_field("id"))?;
        let data = match document.get("data") {
            Some(data) => NodeData::deserialize(data).map_err(D::Error::custom)?,
            None => NodeData::default(),
        };

        Ok(Self {
            id,
            display_name: text_of(&document, "displayName").unwrap_or_default(),
            data,
            document,
        })
    }
}

/// Full pipeline definition as exchanged with the canvas
///
/// The canvas owns the document: everything except node display names and
/// attrs is written back exactly as it was read, keys in their original order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobGraph {
    pub nodes: Vec<GraphNode>,

    document: Map<String, Value>,
}

impl JobGraph {
    pub fn new(nodes: Vec<GraphNode>) -> Self {
        Self {
            nodes,
            document: Map::new(),
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize the whole graph; saves always ship the complete document
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }
}

impl Serialize for JobGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut document = self.document.clone();
        if document.contains_key("nodes") || !self.nodes.is_empty() {
            let nodes = serde_json::to_value(&self.nodes).map_err(S::Error::custom)?;
            document.insert("nodes".to_string(), nodes);
        }
        document.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JobGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut document = Map::deserialize(deserializer)?;
        // The node list is rebuilt on write; the key stays to keep its position
        let nodes = match document.get_mut("nodes") {
            Some(nodes) => Vec::<GraphNode>::deserialize(nodes.take()).map_err(D::Error::custom)?,
            None => Vec::new(),
        };
        Ok(Self { nodes, document })
    }
}

fn text_of(document: &Map<String, Value>, key: &str) -> Option<String> {
    document.get(key).and_then(Value::as_str).map(String::from)
}

/// Write a text field back only if it differs from the document
fn sync_text(document: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    let current = document.get(key).and_then(Value::as_str);
    if current == value {
        return;
    }
    match value {
        Some(value) => {
            document.insert(key.to_string(), Value::String(value.to_string()));
        }
        None if document.contains_key(key) => {
            document.insert(key.to_string(), Value::Null);
        }
        None => {}
    }
}
