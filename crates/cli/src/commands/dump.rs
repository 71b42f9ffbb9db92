use anyhow::{Context, Result};

use super::load_config;
use crate::cli::Format;

pub fn dump_command(source: &str, format: Format, context: &[String], raw: bool) -> Result<()> {
    print!("{}", dump_output(source, format, context, raw)?);
    Ok(())
}

pub fn dump_output(source: &str, format: Format, context: &[String], raw: bool) -> Result<String> {
    let config = load_config(source, context, !raw)?;
    let tree = config.to_value()?;
    let mut text = format
        .adapter()
        .encode(&tree)
        .with_context(|| format!("Failed to encode {} as {:?}", source, format))?;
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}
