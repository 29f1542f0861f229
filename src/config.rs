//! Configuration module for dropwatch.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `DROPWATCH_` and use double
//! underscores to separate nested levels:
//! - `DROPWATCH_STORE_PATH=/var/lib/dropwatch.json` sets `store_path`
//! - `DROPWATCH_EVENTS__CAPACITY=1024` sets `events.capacity`
//! - `DROPWATCH_LOGGING__DEFAULT=debug` sets `logging.default`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Directory holding the settings file and, by default, the store.
pub const CONFIG_DIR: &str = ".dropwatch";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the configuration store. Relative paths resolve against the workspace root.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Workspace root directory (where .dropwatch is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Observer channel settings
    #[serde(default)]
    pub events: EventsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EventsConfig {
    /// Events buffered per subscriber before slow subscribers start lagging
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level: error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target overrides, e.g. `dropwatch = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_store_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("configurations.json")
}
fn default_event_capacity() -> usize {
    256
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            store_path: default_store_path(),
            workspace_root: None,
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .dropwatch directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("settings.toml"));

        Self::load_from(config_path).map(|mut settings| {
            if settings.workspace_root.is_none() {
                settings.workspace_root = Self::workspace_root();
            }
            settings
        })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            // Double underscore (__) separates nested levels
            .merge(Env::prefixed("DROPWATCH_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Store path with relative paths resolved against the workspace root.
    pub fn resolved_store_path(&self) -> PathBuf {
        match &self.workspace_root {
            Some(root) if self.store_path.is_relative() => root.join(&self.store_path),
            _ => self.store_path.clone(),
        }
    }

    /// Find the workspace config by looking for .dropwatch directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join("settings.toml"))
    }

    /// Get the workspace root directory (where .dropwatch is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in `dir/.dropwatch/settings.toml`
    pub fn init_config_file(dir: &Path, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.join(CONFIG_DIR).join("settings.toml");

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let settings = Settings {
            workspace_root: Some(dir.to_path_buf()),
            ..Settings::default()
        };
        settings.save(&config_path)?;

        Ok(config_path)
    }
}
