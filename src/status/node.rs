//! Status Document Model
//!
//! Monitor documents arrive as arbitrary nested JSON. They are classified once,
//! when parsed, into a [`StatusNode`] so the differ never has to inspect shapes.
//!
//! # Shapes
//!
//! - **Object** - ordered key/node pairs (JSON key order is preserved)
//! - **StringList** - a non-empty sequence whose elements are all strings
//! - **Sequence** - any other sequence
//! - **NumericEntity** - an object carrying `type`, `value` and `unit`
//! - **Scalar** - string, number or boolean, kept in text form
//! - **Unsupported** - anything else (`null`)

use crate::error::Result;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum StatusNode {
    Object(Vec<(String, StatusNode)>),
    Sequence(Vec<StatusNode>),
    StringList(Vec<String>),
    NumericEntity {
        kind: String,
        value: String,
        unit: String,
    },
    Scalar(String),
    Unsupported(&'static str),
}

impl StatusNode {
    /// Parse JSON text into a classified tree.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from(value))
    }

    /// Short name of the node's shape, used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            StatusNode::Object(_) => "object",
            StatusNode::Sequence(_) => "sequence",
            StatusNode::StringList(_) => "string list",
            StatusNode::NumericEntity { .. } => "numeric entity",
            StatusNode::Scalar(_) => "scalar",
            StatusNode::Unsupported(kind) => kind,
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_numeric_entity(map: &serde_json::Map<String, Value>) -> bool {
    map.contains_key("type") && map.contains_key("value") && map.contains_key("unit")
}

impl From<Value> for StatusNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) if is_numeric_entity(&map) => StatusNode::NumericEntity {
                kind: map.get("type").map(scalar_text).unwrap_or_default(),
                value: map.get("value").map(scalar_text).unwrap_or_default(),
                unit: map.get("unit").map(scalar_text).unwrap_or_default(),
            },
            Value::Object(map) => StatusNode::Object(
                map.into_iter()
                    .map(|(key, child)| (key, StatusNode::from(child)))
                    .collect(),
            ),
            Value::Array(items) if !items.is_empty() && items.iter().all(Value::is_string) => {
                StatusNode::StringList(items.iter().map(scalar_text).collect())
            }
            Value::Array(items) => {
                StatusNode::Sequence(items.into_iter().map(StatusNode::from).collect())
            }
            Value::String(s) => StatusNode::Scalar(s),
            Value::Number(n) => StatusNode::Scalar(n.to_string()),
            Value::Bool(b) => StatusNode::Scalar(b.to_string()),
            Value::Null => StatusNode::Unsupported("null"),
        }
    }
}
