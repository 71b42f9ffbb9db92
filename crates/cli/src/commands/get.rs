use anyhow::{Result, bail};
use tracing::debug;

use super::{load_config, parse_scalar, to_pretty_json};

pub fn get_command(
    source: &str,
    path: Option<&str>,
    context: &[String],
    default: Option<&str>,
) -> Result<()> {
    println!("{}", get_output(source, path, context, default)?);
    Ok(())
}

pub fn get_output(
    source: &str,
    path: Option<&str>,
    context: &[String],
    default: Option<&str>,
) -> Result<String> {
    let config = load_config(source, context, true)?;
    let path = path.unwrap_or_default();
    debug!("Reading '{}' from {}", path, source);

    let value = match (config.get(path)?, default) {
        (Some(value), _) => value,
        (None, Some(default)) => parse_scalar(default),
        (None, None) => bail!("No value at '{}' in {}", path, source),
    };
    to_pretty_json(&value)
}
