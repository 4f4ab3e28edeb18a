use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::state::LeaderboardOptions;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub requests: RequestConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Leaderboard service settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the leaderboard service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Entries requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_page_size() -> u32 {
    5
}

/// In-flight request handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Ignore responses to requests that a newer request has superseded
    #[serde(default = "default_true")]
    pub discard_out_of_order: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            discard_out_of_order: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Manual refresh settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// How long the refresh button stays locked after use, in milliseconds
    #[serde(default = "default_lock_ms")]
    pub lock_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            lock_ms: default_lock_ms(),
        }
    }
}

fn default_lock_ms() -> u64 {
    500
}

impl Config {
    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "leaderboard", "Leaderboard")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Resolve an optional `--config` override against the default path
    pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(path) => Ok(path.to_path_buf()),
            None => Self::config_path(),
        }
    }

    /// Load configuration from `path`, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            config
                .validate()
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.api.page_size == 0 {
            anyhow::bail!("api.page_size must be at least 1");
        }
        Ok(())
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn refresh_window(&self) -> Duration {
        Duration::from_millis(self.refresh.lock_ms)
    }

    pub fn leaderboard_options(&self) -> LeaderboardOptions {
        LeaderboardOptions {
            page_size: self.api.page_size,
            discard_out_of_order: self.requests.discard_out_of_order,
            refresh_window: self.refresh_window(),
        }
    }

    /// Read a setting by dotted key
    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["api", "base_url"] => Ok(self.api.base_url.clone()),
            ["api", "page_size"] => Ok(self.api.page_size.to_string()),
            ["requests", "discard_out_of_order"] => {
                Ok(self.requests.discard_out_of_order.to_string())
            }
            ["refresh", "lock_ms"] => Ok(self.refresh.lock_ms.to_string()),
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
    }

    /// Write a setting by dotted key
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["api", "base_url"] => {
                self.api.base_url = value.trim_end_matches('/').to_string();
            }
            ["api", "page_size"] => {
                let size: u32 = value.parse()?;
                if size == 0 {
                    anyhow::bail!("api.page_size must be at least 1");
                }
                self.api.page_size = size;
            }
            ["requests", "discard_out_of_order"] => {
                self.requests.discard_out_of_order = value.parse()?;
            }
            ["refresh", "lock_ms"] => {
                self.refresh.lock_ms = value.parse()?;
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }

        Ok(())
    }
}
