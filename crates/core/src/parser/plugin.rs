//! Plugin trait and the middleware chain that drives it

use super::ParseContext;
use crate::error::Result;
use crate::path::NodePath;
use crate::value::Value;
use std::fmt;
use std::rc::Rc;

/// What a plugin decided to do with a node
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Keep the node with this value
    Value(Value),
    /// Keep the node with this value; its children were walked already
    Parsed(Value),
    /// Drop the key (or sequence element) from its container
    Abandoned,
}

/// A step of the parse pipeline
///
/// Plugins see every node of the tree, leaves and containers alike. A
/// plugin that does not handle a node passes it on with
/// [`Next::run`]; one that does returns an [`Outcome`] directly, which
/// short-circuits the plugins after it.
pub trait Plugin {
    fn name(&self) -> &str;

    /// * `value` - the node, moved out of the tree while the chain runs
    /// * `path` - full path of the node inside `subject`
    /// * `subject` - the tree being parsed
    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome>;

    /// Return true to keep the parser from walking into the node's children
    fn prunes(&self, _path: &NodePath) -> bool {
        false
    }
}

/// A registered plugin with its ordering keys
#[derive(Clone)]
pub struct PluginEntry {
    pub priority: i32,
    pub sequence: u64,
    pub plugin: Rc<dyn Plugin>,
}

impl fmt::Debug for PluginEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginEntry")
            .field("name", &self.plugin.name())
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// The remainder of the chain after the current plugin
#[derive(Clone, Copy)]
pub struct Next<'c> {
    rest: &'c [PluginEntry],
}

impl<'c> Next<'c> {
    pub(crate) fn new(chain: &'c [PluginEntry]) -> Self {
        Self { rest: chain }
    }

    /// Hand the node to the following plugin; the chain tail keeps it as is
    pub fn run(
        self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
    ) -> Result<Outcome> {
        match self.rest.split_first() {
            Some((entry, rest)) => {
                entry
                    .plugin
                    .apply(value, path, subject, cx, Next { rest })
            }
            None => Ok(Outcome::Value(value)),
        }
    }
}

type PluginFn = dyn Fn(Value, &NodePath, &mut Value, &mut ParseContext<'_>, Next<'_>) -> Result<Outcome>;

/// Adapter turning a closure into a [`Plugin`]
pub struct FnPlugin {
    name: String,
    apply: Box<PluginFn>,
}

impl FnPlugin {
    pub fn new<F>(name: impl Into<String>, apply: F) -> Self
    where
        F: Fn(Value, &NodePath, &mut Value, &mut ParseContext<'_>, Next<'_>) -> Result<Outcome> + 'static,
    {
        Self {
            name: name.into(),
            apply: Box::new(apply),
        }
    }
}

impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome> {
        (self.apply)(value, path, subject, cx, next)
    }
}
