//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\rolas\config.toml
//! - macOS: ~/Library/Application Support/rolas/config.toml
//! - Linux: ~/.config/rolas/config.toml
//!
//! Every section is optional; missing keys take their defaults. Command-line
//! flags override whatever is loaded here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::db::DEFAULT_DB_NAME;
use crate::error::{Error, Result};
use crate::scanner::DEFAULT_EXTENSION;

const APP_DIR: &str = "rolas";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library settings
    pub library: LibraryConfig,

    /// Database settings
    pub database: DatabaseConfig,
}

/// Where and what to scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Scan root (unset = ~/Music)
    pub root: Option<PathBuf>,

    /// File name suffix of the files to scan, case-sensitive
    pub extension: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            root: None,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file (unset = <cache dir>/rolas/rolas.db)
    pub path: Option<PathBuf>,
}

impl Config {
    /// The scan root, falling back to `~/Music`.
    pub fn library_root(&self) -> Result<PathBuf> {
        match &self.library.root {
            Some(root) => Ok(root.clone()),
            None => default_library_root(),
        }
    }

    /// The database file, falling back to the cache directory.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => default_database_path(),
        }
    }
}

/// `~/Music`
pub fn default_library_root() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join("Music"))
        .ok_or_else(|| Error::config("could not determine the home directory"))
}

/// `<cache dir>/rolas/rolas.db`
pub fn default_database_path() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|cache| cache.join(APP_DIR).join(DEFAULT_DB_NAME))
        .ok_or_else(|| Error::config("could not determine the cache directory"))
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!(target: "config", "Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from a specific file, with the same fallbacks as [`load`].
pub fn load_from(path: &std::path::Path) -> Config {
    if !path.exists() {
        tracing::info!(target: "config", "No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!(target: "config", "Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!(target: "config", "Failed to parse config file {:?}: {}", path, e);
                tracing::warn!(target: "config", "Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!(target: "config", "Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> std::result::Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)?;
    Ok(path)
}

/// Save configuration to a specific file, atomically.
pub fn save_to(config: &Config, path: &std::path::Path) -> std::result::Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write to a temp file, then rename over the target
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!(target: "config", "Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
