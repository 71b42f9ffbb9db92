use crate::context::Context;
use crate::error::Result;
use crate::parser::{Next, Outcome, ParseContext, Plugin};
use crate::path::NodePath;
use crate::value::Value;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Substitution rounds before a self-expanding placeholder is left alone
pub const MAX_INTERPOLATION_PASSES: usize = 32;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("context placeholder pattern"));

/// Substitutes `${name}` and `${name|default}` from the [`Context`]
///
/// A string made of exactly one placeholder takes the variable's typed
/// value, so `"${app.port}"` can become a number or a map. Placeholders
/// embedded in longer text are replaced by the variable's text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextPlugin;

fn split_default(expression: &str) -> (&str, Option<&str>) {
    match expression.split_once('|') {
        Some((name, default)) => (name.trim(), Some(default)),
        None => (expression.trim(), None),
    }
}

fn substitute(text: &str, context: &Context) -> Value {
    if let Some(caps) = PLACEHOLDER.captures(text) {
        if caps.get(0).is_some_and(|whole| whole.len() == text.len()) {
            let (name, default) = split_default(&caps[1]);
            return match (context.get(name), default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => Value::from(default),
                (None, None) => Value::from(text),
            };
        }
    }

    let replaced = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let (name, default) = split_default(&caps[1]);
        match (context.get(name), default) {
            (Some(value), _) => value
                .interpolation_text()
                .unwrap_or_else(|| format!("### Context '{name}' is not a scalar value ###")),
            (None, Some(default)) => default.to_string(),
            (None, None) => caps[0].to_string(),
        }
    });
    Value::String(replaced.into_owned())
}

/// Expand placeholders until none remain or a round changes nothing
pub(crate) fn interpolate(text: String, context: &Context) -> Value {
    let mut current = Value::String(text);
    for _ in 0..MAX_INTERPOLATION_PASSES {
        let Value::String(text) = &current else {
            break;
        };
        if !PLACEHOLDER.is_match(text) {
            break;
        }
        let next = substitute(text, context);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

impl Plugin for ContextPlugin {
    fn name(&self) -> &str {
        "context"
    }

    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome> {
        match value {
            Value::String(text) if text.contains("${") => {
                let interpolated = interpolate(text, cx.context);
                next.run(interpolated, path, subject, cx)
            }
            other => next.run(other, path, subject, cx),
        }
    }
}
