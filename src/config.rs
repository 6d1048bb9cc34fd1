//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults and a few
//! environment overrides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::{env, fs};

use crate::error::{FileStoreError, Result};
pub use crate::metadata::config::{MetadataBackend, MetadataConfig};
pub use crate::storage::config::{StorageBackend, StorageConfig};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "FILE_SHARE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Blob storage configuration
    pub storage: StorageConfig,
    /// Metadata configuration
    pub metadata: MetadataConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum upload size in bytes
    pub max_payload_size: u64,
    /// Origins allowed by CORS; `"*"` allows any
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9710,
            workers: 4,
            max_payload_size: 1073741824, // 1GB
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

/// Where a loaded configuration came from.
///
/// Returned rather than logged, since loading happens before the logger exists.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// The named file did not exist
    Defaults(PathBuf),
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "Loaded configuration from {}", path.display()),
            ConfigSource::Defaults(path) => {
                write!(f, "Config file {} not found, using defaults", path.display())
            }
        }
    }
}

impl AppConfig {
    /// Load from `FILE_SHARE_CONFIG` or `config.yaml`, then apply env overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<(Self, ConfigSource)> {
        let config_path =
            PathBuf::from(env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()));
        let (mut config, source) = if config_path.exists() {
            (Self::load_from(&config_path)?, ConfigSource::File(config_path))
        } else {
            (Self::default(), ConfigSource::Defaults(config_path))
        };
        config.apply_env();
        Ok((config, source))
    }

    /// Parse a YAML configuration file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FileStoreError::storage(format!("Could not read configuration {}", path.display()), e)
        })?;
        Self::from_yaml(&content).map_err(|e| FileStoreError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Apply environment overrides to every section
    pub fn apply_env(&mut self) {
        self.storage.apply_env();
        self.metadata.apply_env();
    }
}
