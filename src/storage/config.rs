//! Configuration for blob storage backends

use crate::error::Result;
use crate::storage::{BlobStore, local_store::LocalBlobStore, mock_store::MockBlobStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::env;
use log::{info, warn};

/// Available blob storage backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Mock,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "localfs" | "filesystem" => Ok(StorageBackend::Local),
            "mock" => Ok(StorageBackend::Mock),
            _ => Err(format!("Unknown storage backend: {}", s))
        }
    }
}

/// Configuration for blob storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage backend type
    pub backend: StorageBackend,
    /// Base directory for stored blobs
    pub base_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_dir: "uploads".to_string(),
        }
    }
}

impl StorageConfig {
    /// Apply `STORAGE_BACKEND` and `STORAGE_BASE_DIR` overrides
    pub fn apply_env(&mut self) {
        if let Ok(backend_str) = env::var("STORAGE_BACKEND") {
            match backend_str.parse::<StorageBackend>() {
                Ok(backend) => {
                    info!("Using storage backend from environment: {:?}", backend);
                    self.backend = backend;
                }
                Err(e) => warn!("Invalid storage backend in environment: {}. Keeping {:?}.", e, self.backend),
            }
        }
        if let Ok(dir) = env::var("STORAGE_BASE_DIR") {
            info!("Using storage directory from environment: {}", dir);
            self.base_dir = dir;
        }
    }

    /// Create a blob store instance based on the configuration
    pub fn create_store(&self) -> Result<Arc<dyn BlobStore>> {
        match self.backend {
            StorageBackend::Local => {
                info!("Creating local blob store at {}", self.base_dir);
                Ok(Arc::new(LocalBlobStore::new(&self.base_dir)?))
            }
            StorageBackend::Mock => {
                info!("Creating mock blob store");
                Ok(Arc::new(MockBlobStore::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("LocalFS".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("filesystem".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!("MOCK".parse::<StorageBackend>().unwrap(), StorageBackend::Mock);

        assert!("invalid".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, StorageBackend::Local);
        assert_eq!(config.base_dir, "uploads");
    }

    #[test]
    #[serial]
    fn test_storage_config_env_overrides() {
        env::set_var("STORAGE_BACKEND", "mock");
        env::set_var("STORAGE_BASE_DIR", "/tmp/elsewhere");
        let mut config = StorageConfig::default();
        config.apply_env();
        assert_eq!(config.backend, StorageBackend::Mock);
        assert_eq!(config.base_dir, "/tmp/elsewhere");

        env::set_var("STORAGE_BACKEND", "invalid");
        let mut config = StorageConfig::default();
        config.apply_env();
        assert_eq!(config.backend, StorageBackend::Local);

        env::remove_var("STORAGE_BACKEND");
        env::remove_var("STORAGE_BASE_DIR");
    }

    #[test]
    fn test_create_store() {
        let dir = TempDir::new().unwrap();
        let local_config = StorageConfig {
            backend: StorageBackend::Local,
            base_dir: dir.path().join("blobs").to_string_lossy().into_owned(),
        };
        let store = local_config.create_store().unwrap();
        assert!(!store.exists("anything").unwrap());
        assert!(dir.path().join("blobs").is_dir());

        let mock_config = StorageConfig { backend: StorageBackend::Mock, ..StorageConfig::default() };
        assert!(mock_config.create_store().is_ok());
    }
}
