//! The configuration facade
//!
//! [`Config`] ties a [`Store`] to the pieces that fill it: the [`Context`]
//! directives read from, the [`Parser`] with its plugins, the [`Resource`]
//! that reads sources and the queue of fixups that run once a tree has been
//! absorbed.

use crate::builder::ConfigBuilder;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::merge::MergeMode;
use crate::parser::{ParseContext, Parser};
use crate::path::NodePath;
use crate::resolver::LazyQueue;
use crate::resource::{AdapterManager, Resource, Source};
use crate::store::Store;
use crate::value::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A configuration tree together with everything needed to load it
#[derive(Debug)]
pub struct Config {
    store: Store,
    context: Context,
    parser: Parser,
    resource: Resource,
    queue: LazyQueue,
}

impl Config {
    /// Empty configuration with the process environment as context and the
    /// built-in plugins and adapters
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    /// Seed the store with `map` as is, without running any directive
    pub fn from_map(map: Map) -> Self {
        Self {
            store: Store::from_map(map),
            context: Context::from_env(),
            parser: Parser::with_defaults(),
            resource: Resource::new(),
            queue: LazyQueue::new(),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Replace the context; the `ENV` section is captured again first
    pub fn with_context(&mut self, data: impl Into<Value>) -> &mut Self {
        self.context = Context::with_data(data.into());
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Directory relative sources resolve against when no file is being read
    pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.resource.set_base_dir(dir);
        self
    }

    /// Replace the whole tree with `source`, resolving its directives
    pub fn load(&mut self, source: impl Into<Source>) -> Result<&mut Self> {
        self.load_with(source, true)
    }

    /// Replace the whole tree with `source`; directives are kept verbatim
    /// unless `parse` is set
    pub fn load_with(&mut self, source: impl Into<Source>, parse: bool) -> Result<&mut Self> {
        self.reset();
        let tree = self.read(source.into(), parse, NodePath::root())?;
        let Value::Map(map) = tree else {
            self.queue.clear();
            return Err(Error::NotAMap(format!("<root> (got {})", tree.kind())));
        };
        self.store.hydrate(map);
        self.queue.drain(&mut self.store)?;
        Ok(self)
    }

    /// Merge `source` into the root
    pub fn import(&mut self, source: impl Into<Source>, mode: MergeMode) -> Result<&mut Self> {
        self.import_to(source, "", mode)
    }

    /// Merge `source` into the node at `path`
    ///
    /// References inside the source are resolved as if it had always lived
    /// at `path`.
    pub fn import_to(
        &mut self,
        source: impl Into<Source>,
        path: &str,
        mode: MergeMode,
    ) -> Result<&mut Self> {
        self.import_with(source, path, mode, true)
    }

    /// Like [`import_to`](Config::import_to), optionally leaving directives
    /// unresolved
    pub fn import_with(
        &mut self,
        source: impl Into<Source>,
        path: &str,
        mode: MergeMode,
        parse: bool,
    ) -> Result<&mut Self> {
        let base = NodePath::parse(path);
        debug!("Importing into '{}' ({})", base, mode);
        let tree = self.read(source.into(), parse, base)?;
        let merged = self.store.merge(tree, path, mode);
        self.discard_on_error(merged)?;
        self.queue.drain(&mut self.store)?;
        Ok(self)
    }

    /// Run the directives of the data already in the store
    pub fn parse(&mut self) -> Result<&mut Self> {
        let mut tree = self.store.root().clone();
        let result = {
            let mut cx = ParseContext::new(
                &self.store,
                &self.context,
                &self.resource,
                &self.parser,
                &mut self.queue,
            );
            self.parser.parse(&mut tree, &mut cx)
        };
        self.discard_on_error(result)?;
        if let Value::Map(map) = tree {
            self.store.hydrate(map);
        }
        self.queue.drain(&mut self.store)?;
        Ok(self)
    }

    /// Write the materialized tree with the adapter matching `target`
    pub fn export(&self, target: impl AsRef<Path>) -> Result<()> {
        let tree = self.store.to_value()?;
        self.resource.write(target.as_ref(), &tree)
    }

    pub fn get(&self, path: &str) -> Result<Option<Value>> {
        self.store.get(path)
    }

    pub fn get_or(&self, path: &str, default: impl Into<Value>) -> Result<Value> {
        self.store.get_or(path, default.into())
    }

    pub fn has(&self, path: &str) -> Result<bool> {
        self.store.has(path)
    }

    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.store.set(path, value)?;
        Ok(self)
    }

    pub fn unset(&mut self, path: &str) -> Result<bool> {
        self.store.unset(path)
    }

    /// The map at `path` as a configuration of its own
    ///
    /// The copy shares nothing with this one but its settings: context,
    /// plugins, adapters and base directory.
    pub fn node(&self, path: &str) -> Result<Option<Config>> {
        Ok(self.store.node(path)?.map(|store| Config {
            store,
            context: self.context.clone(),
            parser: self.parser.clone(),
            resource: self.resource.clone(),
            queue: LazyQueue::new(),
        }))
    }

    pub fn to_value(&self) -> Result<Value> {
        self.store.to_value()
    }

    /// Replace every lazy value in the store by its result
    pub fn resolve(&mut self) -> Result<&mut Self> {
        self.store.resolve_all()?;
        Ok(self)
    }

    /// Drop all data and any pending fixups
    pub fn reset(&mut self) -> &mut Self {
        self.store.reset();
        self.queue.clear();
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut Parser {
        &mut self.parser
    }

    pub fn adapters_mut(&mut self) -> &mut AdapterManager {
        self.resource.adapters_mut()
    }

    fn read(&mut self, source: Source, parse: bool, base: NodePath) -> Result<Value> {
        let result = {
            let mut cx = ParseContext::new(
                &self.store,
                &self.context,
                &self.resource,
                &self.parser,
                &mut self.queue,
            )
            .with_base(base);
            self.resource.read(source, parse, &mut cx)
        };
        self.discard_on_error(result)
    }

    /// Fixups queued by a document that failed to load never reach the store
    fn discard_on_error<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() && !self.queue.is_empty() {
            debug!("Discarding {} queued fixups", self.queue.len());
            self.queue.clear();
        }
        result
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Outcome, plugins::COMMENT_PRIORITY};
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn tree(data: serde_json::Value) -> Source {
        Source::from(Value::from(data))
    }

    fn json_of(config: &Config) -> serde_json::Value {
        config.to_value().unwrap().to_json().unwrap()
    }

    #[test]
    fn test_load_replaces_previous_data() {
        let mut config = Config::new();
        config.load(tree(json!({"old": 1}))).unwrap();
        config.load(tree(json!({"new": 2}))).unwrap();

        assert!(!config.has("old").unwrap());
        assert_eq!(config.get("new").unwrap(), Some(Value::from(2i64)));
    }

    #[test]
    fn test_load_without_parsing_keeps_directives() {
        let mut config = Config::new();
        config
            .load_with(tree(json!({"a": "x", "b": "#a", "--note": "c"})), false)
            .unwrap();
        assert_eq!(json_of(&config), json!({"a": "x", "b": "#a", "--note": "c"}));

        config.parse().unwrap();
        assert_eq!(json_of(&config), json!({"a": "x", "b": "x"}));
    }

    #[test]
    fn test_failed_import_leaves_no_pending_work() {
        let mut config = Config::new();
        config.load(tree(json!({"base": {"a": 1}}))).unwrap();

        let result = config.import(
            tree(json!({"x": {"@extends": "base", "b": 2}, "y": {"@import": 42}})),
            MergeMode::Overwrite,
        );
        assert!(matches!(result, Err(Error::InvalidDirective { .. })));

        config.import(tree(json!({"z": 1})), MergeMode::Overwrite).unwrap();
        assert_eq!(json_of(&config), json!({"base": {"a": 1}, "z": 1}));
    }

    #[test]
    fn test_failed_parse_leaves_no_pending_work() {
        let mut config = Config::new();
        config
            .load_with(
                tree(json!({"base": {"a": 1}, "x": {"@extends": "base"}, "y": {"@import": 42}})),
                false,
            )
            .unwrap();
        assert!(config.parse().is_err());

        config.import(tree(json!({"z": 1})), MergeMode::Overwrite).unwrap();
        assert!(!config.has("x.a").unwrap());
    }

    #[test]
    fn test_load_requires_a_map() {
        let mut config = Config::new();
        let result = config.load(tree(json!([1, 2])));
        assert!(matches!(result, Err(Error::NotAMap(_))));
    }

    #[test]
    fn test_import_modes() {
        let mut config = Config::new();
        config
            .load(tree(json!({"list": [1], "name": "base", "keep": true})))
            .unwrap();

        config
            .import(tree(json!({"list": [2], "name": "combined"})), MergeMode::Combine)
            .unwrap();
        assert_eq!(
            json_of(&config),
            json!({"list": [1, 2], "name": "combined", "keep": true})
        );

        config
            .import(tree(json!({"list": [3], "name": "ignored"})), MergeMode::Preserve)
            .unwrap();
        assert_eq!(config.get("name").unwrap(), Some(Value::from("combined")));

        config
            .import(tree(json!({"list": [3]})), MergeMode::Overwrite)
            .unwrap();
        assert_eq!(config.get("list").unwrap().unwrap().to_json().unwrap(), json!([3]));
    }

    #[test]
    fn test_import_to_resolves_relative_to_mount_point() {
        let mut config = Config::new();
        config.load(tree(json!({"name": "root"}))).unwrap();
        config
            .import_to(
                tree(json!({"host": "db.local", "url": "#{.host}:5432", "owner": "#name"})),
                "services.db",
                MergeMode::Combine,
            )
            .unwrap();

        assert_eq!(config.get("services.db.url").unwrap(), Some(Value::from("db.local:5432")));
        assert_eq!(config.get("services.db.owner").unwrap(), Some(Value::from("root")));
    }

    #[test]
    fn test_context_drives_interpolation() {
        let mut config = Config::new();
        config.with_context(json!({"region": "eu", "ENV": {"HOME": "/custom"}}));
        config
            .load(tree(json!({"zone": "${region}-1", "home": "@env(HOME)", "tier": "${tier|free}"})))
            .unwrap();

        assert_eq!(
            json_of(&config),
            json!({"zone": "eu-1", "home": "/custom", "tier": "free"})
        );
        assert_eq!(config.context().get("region"), Some(&Value::from("eu")));
    }

    #[test]
    fn test_get_set_unset() {
        let mut config = Config::new();
        config.set("a.b.c", 1i64).unwrap().set("a.d", "x").unwrap();

        assert_eq!(config.get_or("a.b.missing", "fallback").unwrap(), Value::from("fallback"));
        assert!(config.has("a.b.c").unwrap());
        assert!(config.unset("a.b").unwrap());
        assert!(!config.unset("a.b").unwrap());
        assert_eq!(json_of(&config), json!({"a": {"d": "x"}}));
    }

    #[test]
    fn test_node_is_detached() {
        let mut config = Config::new();
        config
            .load(tree(json!({"db": {"host": "h", "port": 1}, "flag": true})))
            .unwrap();

        let mut db = config.node("db").unwrap().unwrap();
        db.set("host", "changed").unwrap();

        assert_eq!(config.get("db.host").unwrap(), Some(Value::from("h")));
        assert_eq!(db.get("port").unwrap(), Some(Value::from(1i64)));
        assert!(config.node("missing").unwrap().is_none());
        assert!(matches!(config.node("flag"), Err(Error::NotAMap(_))));
    }

    #[test]
    fn test_resolve_removes_lazy_values() {
        let mut config = Config::new();
        config.load(tree(json!({"a": "x", "b": "#{a}"}))).unwrap();
        assert!(config.store().root().as_map().unwrap()["b"].is_lazy());

        config.resolve().unwrap();
        assert_eq!(config.store().root().as_map().unwrap()["b"], Value::from("x"));
    }

    #[test]
    fn test_files_and_export() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("base.json"),
            r#"{"app": {"name": "demo", "port": 8080}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("main.yaml"),
            "\"@import\": base.json\napp:\n  debug: true\n",
        )
        .unwrap();

        let mut config = Config::new();
        config.set_base_dir(dir.path());
        config.load("main.yaml").unwrap();
        assert_eq!(
            json_of(&config),
            json!({"app": {"name": "demo", "port": 8080, "debug": true}})
        );

        let target = dir.path().join("out/merged.toml");
        config.export(&target).unwrap();

        let mut reloaded = Config::new();
        reloaded.load(target.as_path()).unwrap();
        assert_eq!(json_of(&reloaded), json_of(&config));
    }

    #[test]
    fn test_custom_plugins() {
        let mut config = Config::new();
        config
            .parser_mut()
            .register_fn("redact", COMMENT_PRIORITY + 1, |value, path, subject, cx, next| {
                if path.key() == Some("password") {
                    return Ok(Outcome::Value(Value::from("***")));
                }
                next.run(value, path, subject, cx)
            });

        config
            .load(tree(json!({"user": "u", "password": "secret"})))
            .unwrap();
        assert_eq!(json_of(&config), json!({"user": "u", "password": "***"}));
        assert_eq!(config.parser().plugin_names()[0], "redact");
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut config = Config::new();
        config.load(tree(json!({"a": 1}))).unwrap();
        config.reset();
        assert!(config.store().is_empty());
    }
}
