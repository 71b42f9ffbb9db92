use crate::error::{Error, Result};
use crate::resource::adapter::{Adapter, has_extension};
use crate::value::{Map, Value};

/// `.yaml` and `.yml` files
///
/// Non-string keys are turned into strings and tags are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlAdapter;

fn key_text(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Tagged(tagged) => key_text(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn from_yaml(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::from(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Sequence(items.into_iter().map(from_yaml).collect())
        }
        serde_yaml::Value::Mapping(mapping) => Value::Map(
            mapping
                .into_iter()
                .map(|(key, value)| (key_text(key), from_yaml(value)))
                .collect::<Map>(),
        ),
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

impl Adapter for YamlAdapter {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn supports(&self, uri: &str) -> bool {
        has_extension(uri, &["yaml", "yml"])
    }

    fn decode(&self, text: &str) -> Result<Value> {
        let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| Error::Decode {
            format: "yaml",
            message: e.to_string(),
        })?;
        Ok(match from_yaml(value) {
            Value::Null => Value::empty_map(),
            other => other,
        })
    }

    fn encode(&self, tree: &Value) -> Result<String> {
        serde_yaml::to_string(tree).map_err(|e| Error::Encode {
            format: "yaml",
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_trip() {
        let data = json!({
            "server": {"host": "localhost", "port": 8080, "ratio": 0.5},
            "features": ["a", "b"],
            "debug": false,
            "empty": null
        });
        let adapter = YamlAdapter;

        let text = adapter.encode(&Value::from(data.clone())).unwrap();
        assert_eq!(adapter.decode(&text).unwrap().to_json().unwrap(), data);
    }

    #[test]
    fn test_keys_and_tags_are_normalized() {
        let adapter = YamlAdapter;
        let decoded = adapter
            .decode("1: one\ntrue: yes\nnested: !custom\n  value: 2\n")
            .unwrap();
        assert_eq!(
            decoded.to_json().unwrap(),
            json!({"1": "one", "true": "yes", "nested": {"value": 2}})
        );
    }

    #[test]
    fn test_empty_document_is_an_empty_map() {
        assert_eq!(YamlAdapter.decode("").unwrap(), Value::empty_map());
    }

    #[test]
    fn test_invalid_yaml() {
        let result = YamlAdapter.decode("a: [unclosed");
        assert!(matches!(result, Err(Error::Decode { format: "yaml", .. })));
    }
}
