//! Application configuration
//!
//! Read from `--config <path>` when given, otherwise from `config.toml` in
//! the platform config directory. A missing default file means defaults;
//! every field can be left out.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use duckrun_core::InventoryConfig;
use duckrun_net::NetConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] duckrun_core::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Local player settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// How far away an item can be and still be picked up
    pub reach: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self { reach: 2.5 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub net: NetConfig,
    pub inventory: InventoryConfig,
    pub player: PlayerConfig,
}

impl AppConfig {
    /// Load from `path`, or from the default location when `path` is `None`
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("No config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&text)?;
        config.inventory.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "duckrun", "duckrun").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
