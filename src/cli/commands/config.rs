//! Configuration management commands

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use crate::cli::output::{OutputFormat, print_formatted, print_success};
use crate::config::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Get a specific config value
    Get {
        /// Config key (e.g., "api.base_url", "refresh.lock_ms")
        key: String,
    },

    /// Set a config value
    Set {
        /// Config key (e.g., "api.base_url", "refresh.lock_ms")
        key: String,

        /// Value to set
        value: String,
    },

    /// Show config file path
    Path,
}

#[derive(Serialize)]
struct ConfigPathResult {
    path: String,
    exists: bool,
}

pub async fn run(
    command: ConfigCommands,
    config_path: &Path,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    match command {
        ConfigCommands::Show => show(config_path, format),
        ConfigCommands::Get { key } => get(config_path, &key, format),
        ConfigCommands::Set { key, value } => set(config_path, &key, &value, quiet),
        ConfigCommands::Path => path(config_path, format),
    }
}

fn show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let config = Config::load(config_path)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        OutputFormat::Text => println!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}

fn get(config_path: &Path, key: &str, format: OutputFormat) -> Result<()> {
    let config = Config::load(config_path)?;
    let value = config.get_value(key)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&value)?),
        OutputFormat::Text => println!("{}", value),
    }

    Ok(())
}

fn set(config_path: &Path, key: &str, value: &str, quiet: bool) -> Result<()> {
    let mut config = Config::load(config_path)?;

    config.set_value(key, value)?;
    config.save(config_path)?;

    print_success(&format!("Set {} = {}", key, value), quiet);
    Ok(())
}

fn path(config_path: &Path, format: OutputFormat) -> Result<()> {
    let result = ConfigPathResult {
        path: config_path.to_string_lossy().to_string(),
        exists: config_path.exists(),
    };

    print_formatted(&result, format, |r| {
        format!("{}{}", r.path, if r.exists { "" } else { " (not found)" })
    });

    Ok(())
}
