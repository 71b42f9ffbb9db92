//! Fluent construction of a [`Config`] from layered sources

use crate::config::Config;
use crate::error::Result;
use crate::merge::MergeMode;
use crate::parser::Plugin;
use crate::resource::Source;
use crate::value::{Map, Value};
use std::path::PathBuf;
use std::rc::Rc;
use tracing::debug;

/// Builder for creating configurations
///
/// Sources are applied in the order they were added, each one overwriting
/// what came before. Overrides are applied last.
pub struct ConfigBuilder {
    context: Option<Value>,
    sources: Vec<Source>,
    overrides: Map,
    plugins: Vec<(Rc<dyn Plugin>, i32)>,
    parse: bool,
    base_dir: Option<PathBuf>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            context: None,
            sources: Vec::new(),
            overrides: Map::new(),
            plugins: Vec::new(),
            parse: true,
            base_dir: None,
        }
    }

    /// Variables for `${...}` directives, laid over the process environment
    pub fn context(mut self, data: impl Into<Value>) -> Self {
        self.context = Some(data.into());
        self
    }

    /// Add a file, `path#fragment` or any other source
    pub fn file(mut self, source: impl Into<Source>) -> Self {
        self.sources.push(source.into());
        self
    }

    /// Add every file matching `pattern`, in sorted order
    pub fn glob(mut self, pattern: impl Into<String>) -> Self {
        self.sources.push(Source::Uri(pattern.into()));
        self
    }

    /// Add an in-memory tree
    pub fn tree(mut self, tree: impl Into<Value>) -> Self {
        self.sources.push(Source::Tree(tree.into()));
        self
    }

    /// Values that win over every source
    pub fn overrides(mut self, overrides: Map) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static, priority: i32) -> Self {
        let plugin: Rc<dyn Plugin> = Rc::new(plugin);
        self.plugins.push((plugin, priority));
        self
    }

    /// Whether directives are resolved (the default) or kept verbatim
    pub fn parse(mut self, parse: bool) -> Self {
        self.parse = parse;
        self
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<Config> {
        let mut config = Config::new();
        if let Some(data) = self.context {
            config.with_context(data);
        }
        if let Some(dir) = self.base_dir {
            config.set_base_dir(dir);
        }
        for (plugin, priority) in self.plugins {
            config.parser_mut().register_shared(plugin, priority);
        }

        debug!("Building configuration from {} sources", self.sources.len());
        for source in self.sources {
            config.import_with(source, "", MergeMode::Overwrite, self.parse)?;
        }
        if !self.overrides.is_empty() {
            config.import_with(Value::Map(self.overrides), "", MergeMode::Overwrite, self.parse)?;
        }
        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parser::{Next, Outcome, ParseContext};
    use crate::path::NodePath;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn json_of(config: &Config) -> serde_json::Value {
        config.to_value().unwrap().to_json().unwrap()
    }

    struct Doubler;

    impl Plugin for Doubler {
        fn name(&self) -> &str {
            "doubler"
        }

        fn apply(
            &self,
            value: Value,
            path: &NodePath,
            subject: &mut Value,
            cx: &mut ParseContext<'_>,
            next: Next<'_>,
        ) -> Result<Outcome> {
            match value.as_i64() {
                Some(n) => Ok(Outcome::Value(Value::from(n * 2))),
                None => next.run(value, path, subject, cx),
            }
        }
    }

    #[test]
    fn test_sources_apply_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("defaults.json"), r#"{"level": "info", "port": 80}"#).unwrap();
        fs::write(dir.path().join("local.yaml"), "level: debug\n").unwrap();

        let mut overrides = Map::new();
        overrides.insert("port".to_string(), Value::from(9000i64));

        let config = ConfigBuilder::new()
            .base_dir(dir.path())
            .file("defaults.json")
            .file("local.yaml")
            .tree(json!({"name": "${app|demo}"}))
            .overrides(overrides)
            .build()
            .unwrap();

        assert_eq!(
            json_of(&config),
            json!({"level": "debug", "port": 9000, "name": "demo"})
        );
    }

    #[test]
    fn test_glob_sources() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("conf.d")).unwrap();
        fs::write(dir.path().join("conf.d/10-a.json"), r#"{"a": 1, "shared": "a"}"#).unwrap();
        fs::write(dir.path().join("conf.d/20-b.json"), r#"{"b": 2, "shared": "b"}"#).unwrap();

        let config = Config::builder()
            .base_dir(dir.path())
            .glob("conf.d/*.json")
            .build()
            .unwrap();

        assert_eq!(json_of(&config), json!({"a": 1, "shared": "b", "b": 2}));
    }

    #[test]
    fn test_context_and_plugins() {
        let config = ConfigBuilder::default()
            .context(json!({"env": "prod"}))
            .plugin(Doubler, 0)
            .tree(json!({"stage": "${env}", "replicas": 2}))
            .build()
            .unwrap();

        assert_eq!(json_of(&config), json!({"stage": "prod", "replicas": 4}));
    }

    #[test]
    fn test_unparsed_build() {
        let config = ConfigBuilder::new()
            .parse(false)
            .tree(json!({"a": "#b", "b": "x"}))
            .build()
            .unwrap();

        assert_eq!(config.get("a").unwrap(), Some(Value::from("#b")));
    }

    #[test]
    fn test_build_reports_missing_files() {
        let dir = TempDir::new().unwrap();
        let result = ConfigBuilder::new()
            .base_dir(dir.path())
            .file("missing.json")
            .build();

        match result {
            Err(Error::Source { cause, .. }) => assert!(matches!(*cause, Error::Io(_))),
            other => panic!("expected a source error, got {other:?}"),
        }
    }
}
