//! Runtime variables available to directives

use crate::merge::{MergeMode, merge_values};
use crate::path::NodePath;
use crate::value::{Map, Value};
use tracing::{debug, warn};

/// Section of the context holding the process environment
pub const ENV_SECTION: &str = "ENV";

/// A plain tree of variables read by `${...}` and `@env(...)` directives
///
/// The `ENV` section is filled from the process environment when the
/// context is built. User data is laid over it, so it may override
/// individual `ENV.*` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    data: Value,
}

impl Context {
    /// A context holding only the process environment
    pub fn from_env() -> Self {
        let env: Map = std::env::vars_os()
            .filter_map(|(key, value)| {
                Some((key.into_string().ok()?, Value::String(value.into_string().ok()?)))
            })
            .collect();
        debug!("Captured {} environment variables into context", env.len());

        let mut data = Map::new();
        data.insert(ENV_SECTION.to_string(), Value::Map(env));
        Self {
            data: Value::Map(data),
        }
    }

    /// The process environment overlaid with `data`
    pub fn with_data(data: Value) -> Self {
        let mut context = Self::from_env();
        match data {
            Value::Map(_) => merge_values(&mut context.data, data, MergeMode::Overwrite),
            Value::Null => {}
            other => warn!("Ignoring context data: expected a map, got {}", other.kind()),
        }
        context
    }

    /// A context with no variables at all
    pub fn empty() -> Self {
        Self {
            data: Value::empty_map(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.data.at(&NodePath::parse(path))
    }

    /// Entry of the `ENV` section
    pub fn env(&self, name: &str) -> Option<&Value> {
        self.data.as_map()?.get(ENV_SECTION)?.as_map()?.get(name)
    }

    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        self.data.insert_at(&NodePath::parse(path), value.into());
    }

    pub fn data(&self) -> &Value {
        &self.data
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::from_env()
    }
}
