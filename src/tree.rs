//! Ordered content tree
//!
//! Content items, metadata and block attributes are arbitrary nested
//! key/value structures. `Node` models them as a tagged variant whose
//! mappings keep insertion order, so flattening and re-rendering never
//! reorders fields.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Ordered string-keyed mapping of nodes
pub type Mapping = IndexMap<String, Node>;

/// A node of a content tree
///
/// Serializes to and from plain JSON (`null`, booleans, numbers, strings,
/// arrays, objects) with object key order preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Sequence(Vec<Node>),
    Mapping(Mapping),
}

impl Node {
    pub fn text(value: impl Into<String>) -> Self {
        Node::Text(value.into())
    }

    pub fn empty_mapping() -> Self {
        Node::Mapping(Mapping::new())
    }

    /// Parse a JSON document into a tree, keeping object key order
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Compact JSON rendering, keys in insertion order
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Node::Sequence(_) | Node::Mapping(_))
    }

    /// True for containers without children and for `Null`
    pub fn is_empty(&self) -> bool {
        match self {
            Node::Null => true,
            Node::Sequence(items) => items.is_empty(),
            Node::Mapping(map) => map.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric identifier stored either as a number or as numeric text
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Node::Number(number) => number.as_u64(),
            Node::Text(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Child lookup by mapping key or sequence index
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(map) => map.get(key),
            Node::Sequence(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// String form of a leaf as it travels in a flat field
    ///
    /// Containers have no flat form and yield an empty string.
    pub fn to_flat_string(&self) -> String {
        match self {
            Node::Null => String::new(),
            Node::Bool(value) => value.to_string(),
            Node::Number(number) => number.to_string(),
            Node::Text(text) => text.clone(),
            Node::Sequence(_) | Node::Mapping(_) => String::new(),
        }
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Node::Text(value.to_string())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Node::Text(value)
    }
}

impl From<u64> for Node {
    fn from(value: u64) -> Self {
        Node::Number(Number::from(value))
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Node::Number(Number::from(value))
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Node::Bool(value)
    }
}

impl From<Vec<Node>> for Node {
    fn from(items: Vec<Node>) -> Self {
        Node::Sequence(items)
    }
}

impl From<Mapping> for Node {
    fn from(map: Mapping) -> Self {
        Node::Mapping(map)
    }
}
