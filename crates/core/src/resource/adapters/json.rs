use crate::error::{Error, Result};
use crate::resource::adapter::{Adapter, has_extension};
use crate::value::Value;

/// `.json` files, written pretty-printed
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonAdapter;

impl Adapter for JsonAdapter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn supports(&self, uri: &str) -> bool {
        has_extension(uri, &["json"])
    }

    fn decode(&self, text: &str) -> Result<Value> {
        if text.trim().is_empty() {
            return Ok(Value::empty_map());
        }
        serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from)
            .map_err(|e| Error::Decode {
                format: "json",
                message: e.to_string(),
            })
    }

    fn encode(&self, tree: &Value) -> Result<String> {
        let mut text = serde_json::to_string_pretty(&tree.to_json()?)?;
        text.push('\n');
        Ok(text)
    }
}
