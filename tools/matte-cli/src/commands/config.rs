//! Show or initialize the configuration.

use std::path::PathBuf;

use matte_common::config::{config_file_path, AppConfig};

pub fn run(config: &AppConfig, path: Option<PathBuf>, init: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(config_file_path);

    if init {
        if path.exists() {
            println!("Config already exists: {}", path.display());
            return Ok(());
        }
        AppConfig::default()
            .save_to(&path)
            .map_err(|e| anyhow::anyhow!("Failed to write config to {}: {e}", path.display()))?;
        println!("Wrote default config: {}", path.display());
        return Ok(());
    }

    let status = if path.exists() { "" } else { " (not found, using defaults)" };
    println!("# {}{status}", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
