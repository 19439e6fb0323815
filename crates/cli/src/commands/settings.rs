//! Configuration commands

use std::path::Path;

use anyhow::{bail, Result};

use crate::config::AppConfig;
use crate::output::{print_json, print_success, OutputFormat};

/// Print the merged configuration
pub fn show(config: &AppConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(config),
        OutputFormat::Table => {
            if let Ok(path) = AppConfig::config_path() {
                println!("# default file: {}", path.display());
            }
            print_json(config)
        }
    }
}

/// Write the default configuration
pub fn init(path: Option<&Path>, force: bool) -> Result<()> {
    let target = match path {
        Some(p) => p.to_path_buf(),
        None => AppConfig::config_path()?,
    };
    if target.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", target.display());
    }

    let written = AppConfig::default().save(Some(&target))?;
    print_success(&format!("Wrote default configuration to {}", written.display()));
    Ok(())
}
