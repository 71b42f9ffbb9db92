use crate::context::Context;
use crate::error::Result;
use crate::parser::{Next, Outcome, ParseContext, Plugin};
use crate::path::NodePath;
use crate::value::Value;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENV_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@env\(([^)]*)\)").expect("env directive pattern"));

/// Expands `@env(NAME)` inside strings
///
/// The context's `ENV` section is consulted first, then the live process
/// environment. Unknown variables leave the directive text untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvPlugin;

fn expand(text: &str, context: &Context) -> String {
    ENV_DIRECTIVE
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps[1].trim();
            context
                .env(name)
                .and_then(Value::interpolation_text)
                .or_else(|| std::env::var(name).ok())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

impl Plugin for EnvPlugin {
    fn name(&self) -> &str {
        "env"
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
            Value::String(text) if ENV_DIRECTIVE.is_match(&text) => {
                let expanded = expand(&text, cx.context);
                next.run(Value::String(expanded), path, subject, cx)
            }
            other => next.run(other, path, subject, cx),
        }
    }
}
