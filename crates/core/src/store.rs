//! Dot-path addressable configuration store

use crate::error::{Error, Result};
use crate::merge::{MergeMode, merge_values};
use crate::path::{NodePath, PathCache};
use crate::resolver::{materialize, resolve_chain};
use crate::value::{Map, Value};
use std::fmt;
use tracing::debug;

/// Owns one configuration tree and resolves lazy cells on read
///
/// Reads hand out owned, fully materialized values, so callers never hold
/// aliases into the tree.
pub struct Store {
    root: Value,
    cache: PathCache,
}

impl Store {
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    pub fn from_map(map: Map) -> Self {
        Self {
            root: Value::Map(map),
            cache: PathCache::default(),
        }
    }

    /// Value at `path`, or `None` when any segment is missing
    ///
    /// `Some(Value::Null)` means the key exists with an explicit null.
    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        let segments = self.cache.segments(path);
        self.descend(&self.root, &segments)
    }

    /// Like [`get`](Store::get) for an already split path
    pub fn get_path(&self, path: &NodePath) -> Result<Option<Value>> {
        self.descend(&self.root, path.segments())
    }

    pub fn get_or(&self, path: &str, default: Value) -> Result<Value> {
        Ok(self.get(path)?.unwrap_or(default))
    }

    pub fn has(&self, path: &str) -> Result<bool> {
        Ok(self.get(path)?.is_some())
    }

    fn descend(&self, node: &Value, segments: &[String]) -> Result<Option<Value>> {
        if let Value::Lazy(_) = node {
            let resolved = resolve_chain(node.clone(), self)?;
            return self.descend(&resolved, segments);
        }

        let Some((first, rest)) = segments.split_first() else {
            return materialize(node.clone(), self).map(Some);
        };

        let child = match node {
            Value::Map(map) => map.get(first),
            Value::Sequence(items) => first.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match child {
            Some(child) => self.descend(child, rest),
            None => Ok(None),
        }
    }

    /// Write `value` at `path`, creating intermediate maps as needed
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let path = self.parse_path(path);
        self.set_path(&path, value.into())
    }

    pub fn set_path(&mut self, path: &NodePath, value: Value) -> Result<()> {
        if path.is_root() {
            return match value {
                Value::Map(_) => {
                    self.root = value;
                    Ok(())
                }
                other => Err(Error::NotAMap(format!("<root> (got {})", other.kind()))),
            };
        }

        self.settle(path, path.len() - 1)?;
        self.root.insert_at(path, value);
        Ok(())
    }

    /// Remove the node at `path`; `true` if something was removed
    pub fn unset(&mut self, path: &str) -> Result<bool> {
        let path = self.parse_path(path);
        if path.is_root() {
            return Ok(false);
        }
        self.settle(&path, path.len() - 1)?;
        Ok(self.root.remove_at(&path).is_some())
    }

    /// Deep-merge `tree` into the node at `base`
    pub fn merge(&mut self, tree: Value, base: &str, mode: MergeMode) -> Result<()> {
        let base = self.parse_path(base);
        debug!("Merging {} into '{}' ({})", tree.kind(), base, mode);

        if base.is_root() && !tree.is_map() {
            return Err(Error::NotAMap(format!("<root> (got {})", tree.kind())));
        }

        self.settle(&base, base.len())?;
        match self.root.at_mut(&base) {
            Some(existing) => merge_values(existing, tree, mode),
            None => self.root.insert_at(&base, tree),
        }
        Ok(())
    }

    /// Detached copy of the map at `path`
    pub fn node(&self, path: &str) -> Result<Option<Store>> {
        match self.get(path)? {
            None => Ok(None),
            Some(Value::Map(map)) => Ok(Some(Store::from_map(map))),
            Some(other) => Err(Error::NotAMap(format!("{path} (got {})", other.kind()))),
        }
    }

    /// Replace the whole tree
    pub fn hydrate(&mut self, map: Map) {
        self.root = Value::Map(map);
        self.cache.clear();
    }

    /// Take the tree out, leaving an empty map behind
    pub fn take(&mut self) -> Map {
        match std::mem::replace(&mut self.root, Value::empty_map()) {
            Value::Map(map) => map,
            _ => Map::new(),
        }
    }

    pub fn reset(&mut self) {
        self.hydrate(Map::new());
    }

    /// The raw tree, lazy cells included
    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.as_map().is_none_or(Map::is_empty)
    }

    /// Materialized copy of the whole tree
    pub fn to_value(&self) -> Result<Value> {
        materialize(self.root.clone(), self)
    }

    /// Replace every lazy cell in the tree by its value
    pub fn resolve_all(&mut self) -> Result<()> {
        self.root = self.to_value()?;
        Ok(())
    }

    fn parse_path(&self, path: &str) -> NodePath {
        NodePath::from_segments(self.cache.segments(path).iter().cloned())
    }

    /// Resolve lazy cells sitting on the first `depth` segments of `path`
    fn settle(&mut self, path: &NodePath, depth: usize) -> Result<()> {
        for end in 1..=depth {
            let prefix = NodePath::from_segments(path.segments()[..end].iter().cloned());
            let cell = match self.root.at(&prefix) {
                Some(cell @ Value::Lazy(_)) => cell.clone(),
                Some(_) => continue,
                None => break,
            };
            let resolved = resolve_chain(cell, self)?;
            self.root.insert_at(&prefix, resolved);
        }
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            cache: PathCache::default(),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("root", &self.root)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use serde_json::json;

    fn store(value: serde_json::Value) -> Store {
        let mut store = Store::new();
        store.set("", Value::from(value)).unwrap();
        store
    }

    #[test]
    fn test_get_distinguishes_null_from_absent() {
        let store = store(json!({"a": {"b": null}}));
        assert_eq!(store.get("a.b").unwrap(), Some(Value::Null));
        assert_eq!(store.get("a.c").unwrap(), None);
        assert!(store.has("a.b").unwrap());
        assert!(!store.has("a.b.c").unwrap());
    }

    #[test]
    fn test_get_or_for_every_missing_prefix() {
        let store = store(json!({"db": {"host": "localhost"}}));
        let fallback = Value::from("fallback");
        for path in ["x", "db.x", "db.host.x", "db.host.x.y"] {
            assert_eq!(store.get_or(path, fallback.clone()).unwrap(), fallback, "{path}");
        }
        assert_eq!(store.get_or("db.host", fallback).unwrap(), Value::from("localhost"));
    }

    #[test]
    fn test_get_indexes_sequences() {
        let store = store(json!({"servers": [{"name": "a"}, {"name": "b"}]}));
        assert_eq!(store.get("servers.1.name").unwrap(), Some(Value::from("b")));
        assert_eq!(store.get("servers.2").unwrap(), None);
    }

    #[test]
    fn test_set_replaces_scalar_intermediates() {
        let mut store = store(json!({"a": "scalar"}));
        store.set("a.b.c", 1i64).unwrap();
        assert_eq!(store.to_value().unwrap().to_json().unwrap(), json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn test_set_root_requires_map() {
        let mut store = Store::new();
        assert!(matches!(store.set("", "text"), Err(Error::NotAMap(_))));
    }

    #[test]
    fn test_lazy_values_resolve_on_read() {
        let mut store = store(json!({"port": 8080}));
        store
            .set(
                "url",
                Value::Lazy(Resolver::new("url", |s: &Store| {
                    let port = s.get_or("port", Value::Null)?;
                    Ok(Value::from(format!("http://localhost:{}", port.interpolation_text().unwrap_or_default())))
                })),
            )
            .unwrap();

        assert_eq!(store.get("url").unwrap(), Some(Value::from("http://localhost:8080")));
        assert!(store.root().at(&"url".into()).unwrap().is_lazy());

        store.resolve_all().unwrap();
        assert!(!store.root().at(&"url".into()).unwrap().is_lazy());
    }

    #[test]
    fn test_set_through_lazy_intermediate() {
        let mut store = Store::new();
        store
            .set(
                "section",
                Value::Lazy(Resolver::new("section", |_| Ok(Value::from(json!({"a": 1}))))),
            )
            .unwrap();
        store.set("section.b", 2i64).unwrap();
        assert_eq!(
            store.get("section").unwrap().unwrap().to_json().unwrap(),
            json!({"a": 1, "b": 2})
        );
    }

    #[test]
    fn test_unset() {
        let mut store = store(json!({"a": {"b": 1, "c": 2}}));
        assert!(store.unset("a.b").unwrap());
        assert!(!store.unset("a.b").unwrap());
        assert_eq!(store.get("a").unwrap().unwrap().to_json().unwrap(), json!({"c": 2}));
    }

    #[test]
    fn test_merge_at_base_path() {
        let mut store = store(json!({"app": {"name": "demo"}}));
        store
            .merge(Value::from(json!({"port": 80})), "app.http", MergeMode::Combine)
            .unwrap();
        store
            .merge(Value::from(json!({"name": "other"})), "app", MergeMode::Preserve)
            .unwrap();
        assert_eq!(
            store.to_value().unwrap().to_json().unwrap(),
            json!({"app": {"name": "demo", "http": {"port": 80}}})
        );
    }

    #[test]
    fn test_node_is_detached() {
        let store = store(json!({"db": {"host": "a"}}));
        let mut node = store.node("db").unwrap().unwrap();
        node.set("host", "b").unwrap();

        assert_eq!(store.get("db.host").unwrap(), Some(Value::from("a")));
        assert!(store.node("missing").unwrap().is_none());
        assert!(store.node("db.host").is_err());
    }

    #[test]
    fn test_reset() {
        let mut store = store(json!({"a": 1}));
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.get("a").unwrap(), None);
    }
}
