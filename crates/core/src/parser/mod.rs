//! Directive-processing pipeline
//!
//! The [`Parser`] walks a tree depth-first and passes each node through a
//! priority-ordered chain of [`Plugin`]s. Plugins rewrite values in place,
//! drop keys, read other sources through the [`Resource`], or queue work
//! that has to wait until the whole document sits in the [`Store`].

pub mod plugin;
pub mod plugins;

pub use plugin::{FnPlugin, Next, Outcome, Plugin, PluginEntry};

use crate::context::Context;
use crate::error::Result;
use crate::path::NodePath;
use crate::resolver::LazyQueue;
use crate::resource::Resource;
use crate::store::Store;
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Everything a plugin may consult while a tree is parsed
pub struct ParseContext<'a> {
    pub store: &'a Store,
    pub context: &'a Context,
    pub resource: &'a Resource,
    pub parser: &'a Parser,
    pub queue: &'a mut LazyQueue,
    /// Store path the parsed tree will be mounted at
    pub base: NodePath,
}

impl<'a> ParseContext<'a> {
    pub fn new(
        store: &'a Store,
        context: &'a Context,
        resource: &'a Resource,
        parser: &'a Parser,
        queue: &'a mut LazyQueue,
    ) -> Self {
        Self {
            store,
            context,
            resource,
            parser,
            queue,
            base: NodePath::root(),
        }
    }

    pub fn with_base(mut self, base: NodePath) -> Self {
        self.base = base;
        self
    }

    /// Nesting level of the parse currently running (1 for the top level)
    pub fn depth(&self) -> usize {
        self.parser.depth()
    }

    /// Absolute store path of a node at `path` inside the parsed tree
    pub fn absolute(&self, path: &NodePath) -> NodePath {
        self.base.join(path)
    }
}

/// Ordered plugin registry and tree walker
pub struct Parser {
    entries: Vec<PluginEntry>,
    next_sequence: u64,
    chain: RefCell<Option<Rc<[PluginEntry]>>>,
    depth: Cell<usize>,
}

impl Parser {
    /// A parser with no plugins
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_sequence: 0,
            chain: RefCell::new(None),
            depth: Cell::new(0),
        }
    }

    /// A parser with every built-in directive registered
    pub fn with_defaults() -> Self {
        let mut parser = Self::new();
        plugins::register_defaults(&mut parser);
        parser
    }

    /// Add a plugin. Higher priorities run first; ties keep registration order.
    pub fn register(&mut self, plugin: impl Plugin + 'static, priority: i32) -> &mut Self {
        self.register_shared(Rc::new(plugin), priority)
    }

    pub fn register_shared(&mut self, plugin: Rc<dyn Plugin>, priority: i32) -> &mut Self {
        debug!("Registering plugin {} at priority {}", plugin.name(), priority);
        self.entries.push(PluginEntry {
            priority,
            sequence: self.next_sequence,
            plugin,
        });
        self.next_sequence += 1;
        self.chain.replace(None);
        self
    }

    /// Register a closure as a plugin
    pub fn register_fn<F>(&mut self, name: impl Into<String>, priority: i32, apply: F) -> &mut Self
    where
        F: Fn(Value, &NodePath, &mut Value, &mut ParseContext<'_>, Next<'_>) -> Result<Outcome> + 'static,
    {
        self.register(FnPlugin::new(name, apply), priority)
    }

    /// Plugin names in execution order
    pub fn plugin_names(&self) -> Vec<String> {
        self.chain()
            .iter()
            .map(|entry| entry.plugin.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    fn chain(&self) -> Rc<[PluginEntry]> {
        if let Some(chain) = self.chain.borrow().as_ref() {
            return Rc::clone(chain);
        }
        let mut sorted = self.entries.clone();
        sorted.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.sequence.cmp(&b.sequence))
        });
        let chain: Rc<[PluginEntry]> = sorted.into();
        self.chain.replace(Some(Rc::clone(&chain)));
        chain
    }

    /// Run the plugin chain over every node of `tree`
    pub fn parse(&self, tree: &mut Value, cx: &mut ParseContext<'_>) -> Result<()> {
        let _depth = DepthGuard::enter(&self.depth);
        let chain = self.chain();
        debug!(
            "Parsing tree at depth {} with {} plugins (base '{}')",
            self.depth(),
            chain.len(),
            cx.base
        );
        self.walk(tree, &NodePath::root(), &chain, cx)
    }

    /// Run the plugin chain over the descendants of the node at `at`
    ///
    /// The node itself is left alone. Used by plugins that splice new
    /// content into `tree` and need it parsed in place.
    pub fn walk_node(&self, tree: &mut Value, at: &NodePath, cx: &mut ParseContext<'_>) -> Result<()> {
        let chain = self.chain();
        self.walk(tree, at, &chain, cx)
    }

    fn walk(
        &self,
        tree: &mut Value,
        at: &NodePath,
        chain: &[PluginEntry],
        cx: &mut ParseContext<'_>,
    ) -> Result<()> {
        let keys: Vec<String> = match tree.at(at) {
            Some(Value::Map(map)) => map.keys().filter(|key| !key.is_empty()).cloned().collect(),
            Some(Value::Sequence(items)) => (0..items.len()).map(|index| index.to_string()).collect(),
            _ => return Ok(()),
        };

        let mut abandoned = Vec::new();
        for key in keys {
            let path = at.child(key.as_str());

            let is_container = tree.at(&path).is_some_and(Value::is_container);
            let pruned = chain.iter().any(|entry| entry.plugin.prunes(&path));
            if is_container && !pruned {
                self.walk(tree, &path, chain, cx)?;
            }

            // A sibling plugin may have removed the node meanwhile
            let Some(slot) = tree.at_mut(&path) else {
                continue;
            };
            let value = std::mem::take(slot);
            let was_container = value.is_container();

            let (value, walked) = match Next::new(chain).run(value, &path, tree, cx)? {
                Outcome::Value(value) => (value, false),
                Outcome::Parsed(value) => (value, true),
                Outcome::Abandoned => {
                    abandoned.push(key);
                    continue;
                }
            };
            let expanded = !walked && !was_container && value.is_container();
            match tree.at_mut(&path) {
                Some(slot) => *slot = value,
                None => continue,
            }
            if expanded {
                self.walk(tree, &path, chain, cx)?;
            }
        }

        remove_keys(tree, at, abandoned);
        Ok(())
    }
}

fn remove_keys(tree: &mut Value, at: &NodePath, keys: Vec<String>) {
    if keys.is_empty() {
        return;
    }
    match tree.at_mut(at) {
        Some(Value::Map(map)) => {
            for key in keys {
                map.shift_remove(&key);
            }
        }
        Some(Value::Sequence(items)) => {
            let mut indices: Vec<usize> = keys.iter().filter_map(|key| key.parse().ok()).collect();
            indices.sort_unstable_by(|a, b| b.cmp(a));
            for index in indices {
                if index < items.len() {
                    items.remove(index);
                }
            }
        }
        _ => {}
    }
}

/// Keeps the depth counter balanced even when a plugin fails
struct DepthGuard<'p> {
    depth: &'p Cell<usize>,
}

impl<'p> DepthGuard<'p> {
    fn enter(depth: &'p Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        Self { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl Clone for Parser {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            next_sequence: self.next_sequence,
            chain: RefCell::new(None),
            depth: Cell::new(0),
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("plugins", &self.plugin_names())
            .field("depth", &self.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    struct Harness {
        store: Store,
        context: Context,
        resource: Resource,
        queue: LazyQueue,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Store::new(),
                context: Context::empty(),
                resource: Resource::new(),
                queue: LazyQueue::new(),
            }
        }

        fn parse(&mut self, parser: &Parser, tree: &mut Value) -> Result<()> {
            let mut cx = ParseContext::new(
                &self.store,
                &self.context,
                &self.resource,
                parser,
                &mut self.queue,
            );
            parser.parse(tree, &mut cx)
        }
    }

    fn upper(value: Value, path: &NodePath, subject: &mut Value, cx: &mut ParseContext<'_>, next: Next<'_>) -> Result<Outcome> {
        match value {
            Value::String(s) => next.run(Value::String(s.to_uppercase()), path, subject, cx),
            other => next.run(other, path, subject, cx),
        }
    }

    #[test]
    fn test_chain_order_is_priority_then_registration() {
        let mut parser = Parser::new();
        parser.register_fn("low", 1, |v, p, s, cx, next| next.run(v, p, s, cx));
        parser.register_fn("first-high", 10, |v, p, s, cx, next| next.run(v, p, s, cx));
        parser.register_fn("second-high", 10, |v, p, s, cx, next| next.run(v, p, s, cx));

        assert_eq!(parser.plugin_names(), vec!["first-high", "second-high", "low"]);

        parser.register_fn("top", 100, |v, p, s, cx, next| next.run(v, p, s, cx));
        assert_eq!(parser.plugin_names()[0], "top");
    }

    #[test]
    fn test_plugins_rewrite_every_leaf() {
        let mut parser = Parser::new();
        parser.register_fn("upper", 0, upper);

        let mut tree = Value::from(json!({"a": "x", "b": {"c": "y", "list": ["z", 1]}}));
        Harness::new().parse(&parser, &mut tree).unwrap();

        assert_eq!(
            tree.to_json().unwrap(),
            json!({"a": "X", "b": {"c": "Y", "list": ["Z", 1]}})
        );
    }

    #[test]
    fn test_later_plugins_see_earlier_output() {
        let mut parser = Parser::new();
        parser.register_fn("suffix", 0, |value, path, subject, cx, next| match value {
            Value::String(s) => next.run(Value::String(format!("{s}!")), path, subject, cx),
            other => next.run(other, path, subject, cx),
        });
        parser.register_fn("upper", 5, upper);

        let mut tree = Value::from(json!({"greeting": "hi"}));
        Harness::new().parse(&parser, &mut tree).unwrap();
        assert_eq!(tree.to_json().unwrap(), json!({"greeting": "HI!"}));
    }

    #[test]
    fn test_abandoned_nodes_are_removed() {
        let mut parser = Parser::new();
        parser.register_fn("drop-x", 0, |value, path, subject, cx, next| {
            if value.as_str() == Some("x") {
                return Ok(Outcome::Abandoned);
            }
            next.run(value, path, subject, cx)
        });

        let mut tree = Value::from(json!({"keep": "a", "drop": "x", "list": ["x", "b", "x", "c"]}));
        Harness::new().parse(&parser, &mut tree).unwrap();
        assert_eq!(tree.to_json().unwrap(), json!({"keep": "a", "list": ["b", "c"]}));
    }

    #[test]
    fn test_expanded_scalars_are_walked() {
        let mut parser = Parser::new();
        parser.register_fn("expand", 10, |value, path, subject, cx, next| {
            if value.as_str() == Some("expand") {
                return Ok(Outcome::Value(Value::from(json!({"inner": "expand-me-not"}))));
            }
            next.run(value, path, subject, cx)
        });
        parser.register_fn("upper", 0, upper);

        let mut tree = Value::from(json!({"node": "expand"}));
        Harness::new().parse(&parser, &mut tree).unwrap();
        assert_eq!(tree.to_json().unwrap(), json!({"node": {"inner": "EXPAND-ME-NOT"}}));
    }

    #[test]
    fn test_parsed_outcomes_are_not_walked_again() {
        let mut parser = Parser::new();
        parser.register_fn("expand", 10, |value, path, subject, cx, next| {
            if value.as_str() == Some("expand") {
                subject.insert_at(path, Value::from(json!({"inner": "x"})));
                let parser = cx.parser;
                parser.walk_node(subject, path, cx)?;
                let walked = subject.at_mut(path).map(std::mem::take).unwrap_or_default();
                return Ok(Outcome::Parsed(walked));
            }
            next.run(value, path, subject, cx)
        });
        parser.register_fn("suffix", 0, |value, path, subject, cx, next| match value {
            Value::String(s) => next.run(Value::String(format!("{s}!")), path, subject, cx),
            other => next.run(other, path, subject, cx),
        });

        let mut tree = Value::from(json!({"node": "expand"}));
        Harness::new().parse(&parser, &mut tree).unwrap();
        assert_eq!(tree.to_json().unwrap(), json!({"node": {"inner": "x!"}}));
    }

    #[test]
    fn test_depth_is_restored_after_errors() {
        let mut parser = Parser::new();
        parser.register_fn("fail", 0, |_, path, _, _, _| {
            Err(Error::NotAMap(path.to_string()))
        });

        let mut tree = Value::from(json!({"a": 1}));
        assert!(Harness::new().parse(&parser, &mut tree).is_err());
        assert_eq!(parser.depth(), 0);
    }

    #[test]
    fn test_plugins_see_full_paths_and_depth() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut parser = Parser::new();
        parser.register_fn("record", 0, move |value, path, subject, cx, next| {
            log.borrow_mut().push(format!("{}@{}", path, cx.depth()));
            next.run(value, path, subject, cx)
        });

        let mut tree = Value::from(json!({"a": {"b": 1}}));
        Harness::new().parse(&parser, &mut tree).unwrap();
        assert_eq!(*seen.borrow(), vec!["a.b@1", "a@1"]);
    }
}
