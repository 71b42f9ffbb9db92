use crate::error::{Error, Result};
use crate::merge::{MergeMode, merge_values};
use crate::parser::{Next, Outcome, ParseContext, Plugin};
use crate::path::NodePath;
use crate::resource::Source;
use crate::value::Value;
use tracing::debug;

/// Key that imports other sources into the enclosing node
pub const IMPORT_KEY: &str = "@import";

/// Handles `"@import": source` and `"@import:mode": [sources...]`
///
/// Sources are read and parsed on their own, combined with each other,
/// then merged into the node holding the directive with the given mode
/// (`combine` by default). The directive key itself is removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportPlugin;

fn invalid(path: &NodePath, message: impl Into<String>) -> Error {
    Error::InvalidDirective {
        directive: IMPORT_KEY,
        path: path.to_string(),
        message: message.into(),
    }
}

/// `Some(mode)` when `key` is an import directive
fn directive_mode(key: &str, path: &NodePath) -> Result<Option<MergeMode>> {
    let Some(rest) = key.strip_prefix(IMPORT_KEY) else {
        return Ok(None);
    };
    match rest.strip_prefix(':') {
        None if rest.is_empty() => Ok(Some(MergeMode::default())),
        None => Ok(None),
        Some(mode) => mode
            .parse()
            .map(Some)
            .map_err(|e| invalid(path, format!("{e}"))),
    }
}

fn sources(value: Value, path: &NodePath) -> Result<Vec<String>> {
    match value {
        Value::String(source) => Ok(vec![source]),
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(source) => Ok(source),
                other => Err(invalid(
                    path,
                    format!("expected a source string, got {}", other.kind()),
                )),
            })
            .collect(),
        other => Err(invalid(
            path,
            format!("expected a source or a list of sources, got {}", other.kind()),
        )),
    }
}

fn read_all(sources: &[String], path: &NodePath, cx: &mut ParseContext<'_>) -> Result<Value> {
    let resource = cx.resource;
    let mut combined = Value::empty_map();
    for source in sources {
        let tree = resource.read(Source::from(source.as_str()), true, cx)?;
        if !tree.is_map() {
            return Err(invalid(
                path,
                format!("{source} does not contain a map (got {})", tree.kind()),
            ));
        }
        merge_values(&mut combined, tree, MergeMode::Combine);
    }
    Ok(combined)
}

impl Plugin for ImportPlugin {
    fn name(&self) -> &str {
        "import"
    }

    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome> {
        let mode = match path.key() {
            Some(key) => directive_mode(key, path)?,
            None => None,
        };
        let Some(mode) = mode else {
            return next.run(value, path, subject, cx);
        };

        let sources = sources(value, path)?;
        let parent = path.parent().unwrap_or_default();
        debug!("Importing {:?} into '{}' ({})", sources, parent, mode);

        // Imported documents are parsed as if mounted where they land
        let mount = cx.absolute(&parent);
        let previous = std::mem::replace(&mut cx.base, mount);
        let imported = read_all(&sources, path, cx);
        cx.base = previous;
        let imported = imported?;

        match subject.at_mut(&parent) {
            Some(node) => merge_values(node, imported, mode),
            None => subject.insert_at(&parent, imported),
        }
        Ok(Outcome::Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::plugins::testing::Fixture;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: serde_json::Value) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content.to_string()).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_directive_mode() {
        let path = NodePath::parse("a.@import");
        assert_eq!(directive_mode("@import", &path).unwrap(), Some(MergeMode::Combine));
        assert_eq!(
            directive_mode("@import:preserve", &path).unwrap(),
            Some(MergeMode::Preserve)
        );
        assert_eq!(directive_mode("@important", &path).unwrap(), None);
        assert_eq!(directive_mode("name", &path).unwrap(), None);
        assert!(directive_mode("@import:replace", &path).is_err());
    }

    #[test]
    fn test_import_merges_into_parent() {
        let dir = TempDir::new().unwrap();
        let defaults = write(&dir, "defaults.json", json!({"timeout": 30, "retries": 3}));

        let mut fixture = Fixture::new();
        let tree = fixture
            .parse(json!({"http": {"@import": defaults, "retries": 5}}))
            .unwrap();

        // combine: imported scalars win over existing ones
        assert_eq!(
            tree.to_json().unwrap(),
            json!({"http": {"retries": 3, "timeout": 30}})
        );
    }

    #[test]
    fn test_import_preserve_keeps_local_values() {
        let dir = TempDir::new().unwrap();
        let defaults = write(&dir, "defaults.json", json!({"timeout": 30, "retries": 3}));

        let mut fixture = Fixture::new();
        let tree = fixture
            .parse(json!({"http": {"@import:preserve": defaults, "retries": 5}}))
            .unwrap();

        assert_eq!(
            tree.to_json().unwrap(),
            json!({"http": {"retries": 5, "timeout": 30}})
        );
    }

    #[test]
    fn test_import_list_combines_sources() {
        let dir = TempDir::new().unwrap();
        let a = write(&dir, "a.json", json!({"tags": ["a"], "name": "a"}));
        let b = write(&dir, "b.json", json!({"tags": ["b"], "name": "b"}));

        let mut fixture = Fixture::new();
        let tree = fixture.parse(json!({"@import": [a, b]})).unwrap();
        assert_eq!(tree.to_json().unwrap(), json!({"tags": ["a", "b"], "name": "b"}));
    }

    #[test]
    fn test_imported_sources_are_parsed() {
        let dir = TempDir::new().unwrap();
        let inner = write(&dir, "inner.json", json!({"greeting": "hi ${user}"}));

        let mut fixture = Fixture::new().with_context(json!({"user": "ada"}));
        let tree = fixture.parse(json!({"@import": inner})).unwrap();
        assert_eq!(tree.to_json().unwrap(), json!({"greeting": "hi ada"}));
    }

    #[test]
    fn test_invalid_directives() {
        let dir = TempDir::new().unwrap();
        let list = dir.path().join("list.json");
        fs::write(&list, "[1, 2]").unwrap();

        let mut fixture = Fixture::new();
        let err = fixture.parse(json!({"@import:bogus": "x.json"})).unwrap_err();
        assert!(matches!(err, Error::InvalidDirective { .. }));

        let err = fixture.parse(json!({"@import": 42})).unwrap_err();
        assert!(matches!(err, Error::InvalidDirective { .. }));

        let err = fixture
            .parse(json!({"@import": list.display().to_string()}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDirective { .. }));
    }
}
