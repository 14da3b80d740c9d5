//! Config command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use epp_core::config::{self, EppConfig};

use crate::output::{print_error, print_info, print_success, print_warning};

/// Resolve the config file path from the `--config` flag
pub fn resolve_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_path)
}

/// Show current configuration
pub fn config_show(config_path: Option<&Path>) -> Result<()> {
    let path = resolve_path(config_path);

    if !path.exists() {
        print_warning(&format!("No configuration file found at {:?}", path));
        print_info("Run 'epp config init' to create one");
        return Ok(());
    }

    print_info(&format!("Configuration file: {:?}", path));
    println!();

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    // Refuse to echo a file the tools could not use
    let _: EppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    println!("{}", content);

    Ok(())
}

/// Write a default configuration file
pub fn config_init(config_path: Option<&Path>, force: bool) -> Result<()> {
    let path = resolve_path(config_path);

    if path.exists() && !force {
        print_error(&format!("Config file already exists: {:?}", path));
        print_info("Use --force to overwrite");
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {:?}", dir))?;
            print_success(&format!("Created config directory: {:?}", dir));
        }
    }

    std::fs::write(&path, generate_default_config()?)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    print_success(&format!("Created configuration file: {:?}", path));
    print_info("Set the password with --password or the EPP_PASSWORD environment variable");

    Ok(())
}

/// Default configuration content
fn generate_default_config() -> Result<String> {
    let body = toml::to_string_pretty(&EppConfig::default())
        .context("Failed to serialize default configuration")?;
    Ok(format!(
        "# EPP toolkit configuration\n\
         # [server] holds TLS parameters, [credentials] the registrar login.\n\
         # Leave the password out of this file and use EPP_PASSWORD instead.\n\n{}",
        body
    ))
}
