use crate::error::{Error, Result};
use crate::resource::adapter::{Adapter, has_extension};
use crate::value::Value;

/// `.toml` files
///
/// TOML has no null, so trees holding nulls cannot be written. Datetimes
/// are read as their string form.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlAdapter;

fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(datetime) => Value::String(datetime.to_string()),
        toml::Value::Array(items) => Value::Sequence(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .into_iter()
                .map(|(key, value)| (key, from_toml(value)))
                .collect(),
        ),
    }
}

fn encode_error(message: String) -> Error {
    Error::Encode {
        format: "toml",
        message,
    }
}

fn to_toml(value: &Value, path: &str) -> Result<toml::Value> {
    Ok(match value {
        Value::Null => {
            return Err(encode_error(format!("null at '{path}' has no TOML representation")));
        }
        Value::Bool(b) => toml::Value::Boolean(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => toml::Value::Integer(i),
            (None, Some(f)) => toml::Value::Float(f),
            (None, None) => return Err(encode_error(format!("number {n} at '{path}' is out of range"))),
        },
        Value::String(s) => toml::Value::String(s.clone()),
        Value::Sequence(items) => toml::Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(index, item)| to_toml(item, &format!("{path}.{index}")))
                .collect::<Result<_>>()?,
        ),
        Value::Map(map) => {
            let mut table = toml::Table::new();
            for (key, value) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                table.insert(key.clone(), to_toml(value, &child)?);
            }
            toml::Value::Table(table)
        }
        Value::Lazy(cell) => return Err(Error::UnresolvedLazy(cell.label().to_string())),
    })
}

impl Adapter for TomlAdapter {
    fn name(&self) -> &'static str {
        "toml"
    }

    fn supports(&self, uri: &str) -> bool {
        has_extension(uri, &["toml"])
    }

    fn decode(&self, text: &str) -> Result<Value> {
        let table: toml::Table = toml::from_str(text).map_err(|e| Error::Decode {
            format: "toml",
            message: e.to_string(),
        })?;
        Ok(from_toml(toml::Value::Table(table)))
    }

    fn encode(&self, tree: &Value) -> Result<String> {
        let toml::Value::Table(table) = to_toml(tree, "")? else {
            return Err(encode_error(format!(
                "the document root must be a map, got {}",
                tree.kind()
            )));
        };
        toml::to_string_pretty(&table).map_err(|e| encode_error(e.to_string()))
    }
}
