//! Application configuration, stored as TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Settings shared by the CLI commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding the per-symbol bar files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Default trailing window for rolling volatility, in trading days.
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_volatility_window() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            volatility_window: default_volatility_window(),
        }
    }
}

impl AppConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content =
            std::fs::read_to_string(path).map_err(|e| format!("read config file: {e}"))?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("parse config TOML: {e}"))
    }

    /// Serialize to TOML.
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("serialize config: {e}"))
    }
}
