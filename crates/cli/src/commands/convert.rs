use anyhow::{Context, Result};
use tracing::info;

use super::load_config;

pub fn convert_command(input: &str, output: &str) -> Result<()> {
    let config = load_config(input, &[], true)?;
    config
        .export(output)
        .with_context(|| format!("Failed to write {}", output))?;
    info!("Converted {} to {}", input, output);
    println!("Wrote {}", output);
    Ok(())
}
