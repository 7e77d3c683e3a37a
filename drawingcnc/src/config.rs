//! Configuration loading for the DrawingCNC command line.

use anyhow::{Context, Result};
use drawingcnc_common::ToolChain;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "drawingcnc.toml";

/// CLI configuration
///
/// The file holds the `[capture]`, `[converter]` and `[tracer]` tables of
/// the tool chain; any table left out keeps its default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub tools: ToolChain,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Load configuration from an explicit file, the default file, or defaults
///
/// An explicitly named file must exist; the default one is optional.
pub fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    match custom_path {
        Some(path) => Config::from_file(path),
        None => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if path.exists() {
                debug!(path = %path.display(), "loading config");
                Config::from_file(&path)
            } else {
                Ok(Config::default())
            }
        }
    }
}
