//! Configuration tree values
//!
//! A tree is a [`Value::Map`] at the root whose leaves are scalars, nested
//! maps, sequences, or [`Value::Lazy`] cells that stand in for a value until
//! it is first read.

use crate::error::{Error, Result};
use crate::path::NodePath;
use crate::resolver::Resolver;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// Insertion-ordered map used for every tree node
pub type Map = IndexMap<String, Value>;

/// A node of the configuration tree
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Sequence(Vec<Value>),
    Map(Map),
    Lazy(Resolver),
}

impl Value {
    pub fn empty_map() -> Self {
        Value::Map(Map::new())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Map(_) => "map",
            Value::Lazy(_) => "lazy",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Value::Lazy(_))
    }

    /// Maps and sequences
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Map(_) | Value::Sequence(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Text used when a scalar is interpolated into a larger string
    ///
    /// Returns `None` for containers and lazy cells.
    pub fn interpolation_text(&self) -> Option<String> {
        match self {
            Value::Null => Some(String::new()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Child node at `path`, indexing maps by key and sequences by position.
    ///
    /// Lazy cells are not resolved; this is raw structural navigation.
    pub fn at(&self, path: &NodePath) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| child(node, segment))
    }

    pub fn at_mut(&mut self, path: &NodePath) -> Option<&mut Value> {
        let mut node = self;
        for segment in path.segments() {
            node = match node {
                Value::Map(map) => map.get_mut(segment)?,
                Value::Sequence(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Write `value` at `path`, creating maps for missing or non-container
    /// intermediates.
    pub fn insert_at(&mut self, path: &NodePath, value: Value) {
        let Some((last, parents)) = path.segments().split_last() else {
            *self = value;
            return;
        };

        let mut node = self;
        for segment in parents {
            node = descend_or_create(node, segment);
        }

        match node {
            Value::Sequence(items) => match last.parse::<usize>() {
                Ok(index) if index < items.len() => items[index] = value,
                Ok(index) if index == items.len() => items.push(value),
                _ => {
                    let mut map = sequence_to_map(std::mem::take(items));
                    map.insert(last.clone(), value);
                    *node = Value::Map(map);
                }
            },
            Value::Map(map) => {
                map.insert(last.clone(), value);
            }
            other => {
                let mut map = Map::new();
                map.insert(last.clone(), value);
                *other = Value::Map(map);
            }
        }
    }

    /// Remove the node at `path`, returning it if it existed
    pub fn remove_at(&mut self, path: &NodePath) -> Option<Value> {
        let (last, parents) = path.segments().split_last()?;
        let parent = self.at_mut(&NodePath::from_segments(parents.iter().cloned()))?;
        match parent {
            Value::Map(map) => map.shift_remove(last),
            Value::Sequence(items) => {
                let index = last.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.remove(index))
            }
            _ => None,
        }
    }

    /// Convert to a `serde_json::Value`; fails on unresolved lazy cells
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Sequence(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_>>()?,
            ),
            Value::Map(map) => {
                let mut object = serde_json::Map::new();
                for (key, value) in map {
                    object.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(object)
            }
            Value::Lazy(cell) => return Err(Error::UnresolvedLazy(cell.label().to_string())),
        })
    }
}

fn child<'v>(node: &'v Value, segment: &str) -> Option<&'v Value> {
    match node {
        Value::Map(map) => map.get(segment),
        Value::Sequence(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

fn descend_or_create<'v>(node: &'v mut Value, segment: &str) -> &'v mut Value {
    let index = match node {
        Value::Sequence(items) => segment
            .parse::<usize>()
            .ok()
            .filter(|index| *index < items.len()),
        _ => None,
    };

    if index.is_none() && !node.is_map() {
        *node = match std::mem::take(node) {
            Value::Sequence(items) => Value::Map(sequence_to_map(items)),
            _ => Value::empty_map(),
        };
    }

    match (node, index) {
        (Value::Sequence(items), Some(index)) => &mut items[index],
        (Value::Map(map), _) => map.entry(segment.to_string()).or_insert_with(Value::empty_map),
        _ => unreachable!("node is either an indexed sequence or a map"),
    }
}

fn sequence_to_map(items: Vec<Value>) -> Map {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (index.to_string(), item))
        .collect()
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Sequence(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(object) => Value::Map(
                object
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become null
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Value::Lazy(cell) => Err(serde::ser::Error::custom(format!(
                "unresolved lazy value: {}",
                cell.label()
            ))),
        }
    }
}
