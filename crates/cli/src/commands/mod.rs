pub mod convert;
pub mod dump;
pub mod get;

pub use convert::convert_command;
pub use dump::dump_command;
pub use get::get_command;

use anyhow::{Context as _, Result, bail};
use nodeconf_core::{Config, NodePath, Value};

/// Turn `KEY=VALUE` pairs into a context tree
///
/// Keys may be dot paths. Values that parse as JSON keep their type,
/// anything else is taken as a string.
pub fn parse_context(pairs: &[String]) -> Result<Value> {
    let mut data = Value::empty_map();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Invalid context '{}': expected KEY=VALUE", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid context '{}': empty key", pair);
        }
        data.insert_at(&NodePath::parse(key), parse_scalar(raw));
    }
    Ok(data)
}

/// JSON when `raw` is valid JSON, a plain string otherwise
pub fn parse_scalar(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Load `source` with the given context
pub fn load_config(source: &str, context: &[String], parse: bool) -> Result<Config> {
    let mut config = Config::new();
    if !context.is_empty() {
        config.with_context(parse_context(context)?);
    }
    config
        .load_with(source, parse)
        .with_context(|| format!("Failed to load {}", source))?;
    Ok(config)
}

pub fn to_pretty_json(value: &Value) -> Result<String> {
    let json = value.to_json()?;
    Ok(serde_json::to_string_pretty(&json)?)
}
