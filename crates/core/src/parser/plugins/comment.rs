use crate::error::Result;
use crate::parser::{Next, Outcome, ParseContext, Plugin};
use crate::path::NodePath;
use crate::value::Value;

/// Keys starting with this prefix are dropped, children included
pub const COMMENT_PREFIX: &str = "--";

/// Removes `--comment` keys from the tree
#[derive(Debug, Default, Clone, Copy)]
pub struct CommentPlugin;

fn is_comment(path: &NodePath) -> bool {
    path.key().is_some_and(|key| key.starts_with(COMMENT_PREFIX))
}

impl Plugin for CommentPlugin {
    fn name(&self) -> &str {
        "comment"
    }

    fn apply(
        &self,
        value: Value,
        path: &NodePath,
        subject: &mut Value,
        cx: &mut ParseContext<'_>,
        next: Next<'_>,
    ) -> Result<Outcome> {
        if is_comment(path) {
            return Ok(Outcome::Abandoned);
        }
        next.run(value, path, subject, cx)
    }

    fn prunes(&self, path: &NodePath) -> bool {
        is_comment(path)
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::plugins::testing::Fixture;
    use serde_json::json;

    #[test]
    fn test_comments_are_removed_without_parsing_them() {
        let mut fixture = Fixture::new();
        let tree = fixture
            .parse(json!({
                "--": "top level note",
                "db": {
                    "--about": {"@import": "does-not-exist.json"},
                    "host": "localhost"
                },
                "not-a-comment": "-x"
            }))
            .unwrap();

        assert_eq!(
            tree.to_json().unwrap(),
            json!({"db": {"host": "localhost"}, "not-a-comment": "-x"})
        );
    }
}
