//! Configuration for metadata storage backends

use crate::error::Result;
use crate::metadata::{MetadataStore, sqlite_store::SqliteMetadataStore, mock_store::MockMetadataStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::env;
use log::{info, warn};

/// Available metadata storage backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataBackend {
    #[default]
    Sqlite,
    Mock,
}

impl std::str::FromStr for MetadataBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(MetadataBackend::Sqlite),
            "mock" => Ok(MetadataBackend::Mock),
            _ => Err(format!("Unknown metadata backend: {}", s))
        }
    }
}

/// Configuration for metadata storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Metadata backend type
    pub backend: MetadataBackend,
    /// Database file path
    pub db_path: String,
    /// Enable WAL mode
    pub wal_mode: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            db_path: "./data/metadata.db".to_string(),
            wal_mode: true,
        }
    }
}

impl MetadataConfig {
    /// Apply `METADATA_BACKEND` and `DB_FILE` overrides
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("METADATA_BACKEND") {
            match backend_str.parse::<MetadataBackend>() {
                Ok(backend) => {
                    info!("Using metadata backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => warn!("Invalid metadata backend in environment: {}. Keeping {:?}.", e, self.backend),
            }
        }
        if let Ok(path) = env::var("DB_FILE") {
            info!("Using database path from environment: {}", path);
            self.db_path = path;
        }
    }

    /// Create a metadata store instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn MetadataStore>> {
        match self.backend {
            MetadataBackend::Sqlite => {
                info!("Creating SQLite metadata store at {} (wal_mode: {})", self.db_path, self.wal_mode);
                Ok(Arc::new(SqliteMetadataStore::open(&self.db_path, self.wal_mode)?))
            }
            MetadataBackend::Mock => {
                info!("Creating Mock metadata store");
                Ok(Arc::new(MockMetadataStore::new()))
            }
        }
    }
}
