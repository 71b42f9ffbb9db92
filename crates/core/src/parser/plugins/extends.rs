use crate::error::{Error, Result};
use crate::merge::{MergeMode, merged};
use crate::parser::{Next, Outcome, ParseContext, Plugin};
use crate::path::NodePath;
use crate::resolver::{Fixup, resolve_chain};
use crate::store::Store;
use crate::value::Value;
use tracing::debug;

/// Key naming the node the enclosing node inherits from
pub const EXTENDS_KEY: &str = "@extends";

/// Node inheritance: `"@extends": "path.to.base"`
///
/// The node becomes a copy of the base with its own keys laid over it
/// (`overwrite` semantics, so own values always win). At the top level the
/// work is queued until the whole document is in the store, which allows
/// bases declared after the node and bases that extend other nodes. Inside
/// imported documents the base is looked up right away, first in the
/// document being parsed, then in the store.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtendsPlugin;

fn invalid(base: &str, reason: impl Into<String>) -> Error {
    Error::InvalidExtends {
        path: base.to_string(),
        reason: reason.into(),
    }
}

/// Store paths a base reference may mean, most specific first
fn candidates(mount: &NodePath, base: &str) -> Vec<NodePath> {
    let absolute = NodePath::parse(base);
    let relative = mount.join(&absolute);
    if relative == absolute {
        vec![absolute]
    } else {
        vec![relative, absolute]
    }
}

/// Raw lookup keeping nested lazy cells, falling back to a resolving read
fn lookup(store: &Store, path: &NodePath) -> Result<Option<Value>> {
    match store.root().at(path) {
        Some(Value::Lazy(cell)) => resolve_chain(Value::Lazy(cell.clone()), store).map(Some),
        Some(value) => Ok(Some(value.clone())),
        None => store.get_path(path),
    }
}

fn require_map(base: &str, value: Option<Value>) -> Result<Value> {
    match value {
        Some(value @ Value::Map(_)) => Ok(value),
        Some(other) => Err(invalid(base, format!("expected a map, got {}", other.kind()))),
        None => Err(invalid(base, "no such node")),
    }
}

fn extend_in_store(store: &mut Store, target: &NodePath, candidates: &[NodePath], base: &str) -> Result<()> {
    let mut found = None;
    for candidate in candidates {
        if let Some(value) = lookup(store, candidate)? {
            found = Some(value);
            break;
        }
    }
    let base_tree = require_map(base, found)?;
    let own = store.root().at(target).cloned().unwrap_or_else(Value::empty_map);

    debug!("Applying @extends {} to {}", base, target);
    store.set_path(target, merged(base_tree, own, MergeMode::Overwrite))
}

fn extend_now(
    subject: &mut Value,
    node: &NodePath,
    base: &str,
    cx: &mut ParseContext<'_>,
) -> Result<()> {
    let in_document = NodePath::parse(base);
    let base_tree = match subject.at(&in_document) {
        Some(found) => {
            // The base may sit later in the document and still hold directives
            let mut copy = found.clone();
            let parser = cx.parser;
            parser.parse(&mut copy, cx)?;
            Some(copy)
        }
        None => {
            let mut found = None;
            for candidate in candidates(&cx.base, base) {
                if let Some(value) = lookup(cx.store, &candidate)? {
                    found = Some(value);
                    break;
                }
            }
            found
        }
    };
    let base_tree = require_map(base, base_tree)?;
    let own = subject.at(node).cloned().unwrap_or_else(Value::empty_map);
    subject.insert_at(node, merged(base_tree, own, MergeMode::Overwrite));
    Ok(())
}

impl Plugin for ExtendsPlugin {
    fn name(&self) -> &str {
        "extends"
    }

    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome> {
        if path.key() != Some(EXTENDS_KEY) {
            return next.run(value, path, subject, cx);
        }

        let base = match &value {
            Value::String(base) if !base.trim().is_empty() => base.trim().to_string(),
            other => {
                return Err(invalid(
                    &path.to_string(),
                    format!("expected a dot path, got {}", other.kind()),
                ));
            }
        };
        let node = path.parent().unwrap_or_default();

        if cx.depth() > 1 {
            extend_now(subject, &node, &base, cx)?;
            return Ok(Outcome::Abandoned);
        }

        let target = cx.absolute(&node);
        let candidates = candidates(&cx.base, &base);
        let fixup = candidates.iter().cloned().fold(
            Fixup::new(format!("{EXTENDS_KEY} {base}"), target.clone(), {
                let candidates = candidates.clone();
                move |store: &mut Store| extend_in_store(store, &target, &candidates, &base)
            }),
            Fixup::depends_on,
        );
        cx.queue.push(fixup);
        Ok(Outcome::Abandoned)
    }
}
