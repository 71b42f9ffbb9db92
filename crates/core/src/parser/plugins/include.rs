use crate::error::Result;
use crate::parser::{Next, Outcome, ParseContext, Plugin};
use crate::path::NodePath;
use crate::resource::Source;
use crate::value::Value;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static INCLUDE_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@include\((.+)\)\s*$").expect("include directive pattern"));

/// Replaces `@include(source)` with the contents of `source`
///
/// The included tree is not parsed on its own: it is spliced into the
/// enclosing document and walked there, at the same depth, while its file
/// stays on the source stack. Nested includes and imports therefore resolve
/// against the included file and an include cycle is reported as one.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncludePlugin;

impl Plugin for IncludePlugin {
    fn name(&self) -> &str {
        "include"
    }

    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome> {
        let source = match value.as_str().and_then(|text| INCLUDE_DIRECTIVE.captures(text)) {
            Some(caps) => caps[1].trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
            None => return next.run(value, path, subject, cx),
        };

        debug!("Including {} at {}", source, path);
        let resource = cx.resource;
        let parser = cx.parser;
        let included = resource.read_each(Source::from(source), cx, |tree, cx| {
            subject.insert_at(path, tree);
            parser.walk_node(subject, path, cx)?;
            Ok(subject.at_mut(path).map(std::mem::take).unwrap_or_default())
        })?;

        match next.run(included, path, subject, cx)? {
            Outcome::Value(value) => Ok(Outcome::Parsed(value)),
            other => Ok(other),
        }
    }
}
