//! Cross-node references: `#path` for whole nodes, `#{path}` inside text
//!
//! A path starting with `.` is relative to the node holding the reference,
//! so `"#.host"` next to a `host` key points at that sibling.

use crate::error::Result;
use crate::parser::{Next, Outcome, ParseContext, Plugin};
use crate::path::NodePath;
use crate::resolver::Resolver;
use crate::store::Store;
use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;

static NODE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(\.?[A-Za-z_][A-Za-z0-9_-]*(?:\.[A-Za-z0-9_-]+)*)(?:\|(.*))?$")
        .expect("node reference pattern")
});

static VALUE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#\{([^}|]+)(?:\|([^}]*))?\}").expect("value reference pattern")
});

fn not_found(reference: &str) -> String {
    format!("### Reference '{reference}' not found ###")
}

fn not_scalar(reference: &str) -> String {
    format!("### Reference '{reference}' is not a scalar value ###")
}

/// Store path a reference written inside `container` points at
fn target(reference: &str, container: &NodePath) -> NodePath {
    match reference.strip_prefix('.') {
        Some(relative) => container.join(&NodePath::parse(relative)),
        None => NodePath::parse(reference),
    }
}

/// Store path of the node holding the value at `path`
fn container(path: &NodePath, cx: &ParseContext<'_>) -> NodePath {
    cx.absolute(&path.parent().unwrap_or_default())
}

/// Replaces `#path` and `#path|default` with the referenced node
///
/// Nodes already in the store are copied immediately. Anything else becomes
/// a lazy cell that looks the node up again when it is first read, so
/// references to parts of the document parsed later still work.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceNodePlugin;

impl Plugin for ReferenceNodePlugin {
    fn name(&self) -> &str {
        "reference-node"
    }

    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome> {
        let Some(caps) = value.as_str().and_then(|text| NODE_REFERENCE.captures(text)) else {
            return next.run(value, path, subject, cx);
        };
        let reference = caps[1].to_string();
        let default = caps.get(2).map(|m| m.as_str().to_string());
        let node = target(&reference, &container(path, cx));

        if let Some(found) = cx.store.get_path(&node)? {
            return Ok(Outcome::Value(found));
        }

        let cell = Resolver::new(format!("#{reference}"), move |store: &Store| {
            Ok(match store.get_path(&node)? {
                Some(found) => found,
                None => Value::String(default.clone().unwrap_or_else(|| not_found(&reference))),
            })
        });
        Ok(Outcome::Value(Value::Lazy(cell)))
    }
}

/// Interpolates `#{path}` and `#{path|default}` inside strings
///
/// The result is always a lazy cell, evaluated against the finished store.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceValuePlugin;

fn interpolate(text: &str, container: &NodePath, store: &Store) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in VALUE_REFERENCE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);

        let reference = caps[1].trim();
        let rendered = match store.get_path(&target(reference, container))? {
            Some(found) => found
                .interpolation_text()
                .unwrap_or_else(|| not_scalar(reference)),
            None => caps
                .get(2)
                .map(|default| default.as_str().to_string())
                .unwrap_or_else(|| not_found(reference)),
        };
        out.push_str(&rendered);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    Ok(out)
}

impl Plugin for ReferenceValuePlugin {
    fn name(&self) -> &str {
        "reference-value"
    }

    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome> {
        let text = match value {
            Value::String(text) if VALUE_REFERENCE.is_match(&text) => text,
            other => return next.run(other, path, subject, cx),
        };

        let container = container(path, cx);
        let cell = Resolver::new(text.clone(), move |store: &Store| {
            interpolate(&text, &container, store).map(Value::String)
        });
        next.run(Value::Lazy(cell), path, subject, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::plugins::testing::Fixture;
    use serde_json::json;

    #[test]
    fn test_node_reference_copies_typed_values() {
        let mut fixture = Fixture::new();
        let tree = fixture
            .load(json!({
                "defaults": {"port": 8080, "tags": ["a", "b"]},
                "api": {"port": "#defaults.port", "tags": "#defaults.tags"}
            }))
            .unwrap();

        assert_eq!(tree["api"], json!({"port": 8080, "tags": ["a", "b"]}));
    }

    #[test]
    fn test_forward_node_reference() {
        let mut fixture = Fixture::new();
        let tree = fixture
            .load(json!({
                "client": {"endpoint": "#server.url"},
                "server": {"url": "http://localhost:9000"}
            }))
            .unwrap();

        assert_eq!(tree["client"]["endpoint"], json!("http://localhost:9000"));
    }

    #[test]
    fn test_node_reference_default_and_marker() {
        let mut fixture = Fixture::new();
        let tree = fixture
            .load(json!({"a": "#missing.path|fallback", "b": "#missing.path"}))
            .unwrap();

        assert_eq!(tree["a"], json!("fallback"));
        assert_eq!(tree["b"], json!("### Reference 'missing.path' not found ###"));
    }

    #[test]
    fn test_relative_node_reference() {
        let mut fixture = Fixture::new();
        let tree = fixture
            .load(json!({"db": {"host": "db.local", "primary": "#.host"}}))
            .unwrap();

        assert_eq!(tree["db"]["primary"], json!("db.local"));
    }

    #[test]
    fn test_value_reference_interpolates_text() {
        let mut fixture = Fixture::new();
        let tree = fixture
            .load(json!({
                "url": "http://#{server.host}:#{server.port}/#{server.path|api}",
                "bad": "x=#{server}",
                "gone": "#{nope}",
                "server": {"host": "example.org", "port": 443}
            }))
            .unwrap();

        assert_eq!(tree["url"], json!("http://example.org:443/api"));
        assert_eq!(tree["bad"], json!("x=### Reference 'server' is not a scalar value ###"));
        assert_eq!(tree["gone"], json!("### Reference 'nope' not found ###"));
    }

    #[test]
    fn test_hash_strings_outside_reference_syntax() {
        let mut fixture = Fixture::new();
        let tree = fixture
            .load(json!({"color": "#ff00ff", "anchor": "page#section", "tag": "# heading"}))
            .unwrap();

        assert_eq!(tree["anchor"], json!("page#section"));
        assert_eq!(tree["tag"], json!("# heading"));
        // Hex colors match the node reference syntax
        assert_eq!(tree["color"], json!("### Reference 'ff00ff' not found ###"));
    }
}
