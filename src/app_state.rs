//! Application State Management
//!
//! This module provides the application state that contains all services
//! and their dependencies, following the dependency injection pattern.

use std::sync::Arc;
use log::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::metadata::{MetadataStore, mock_store::MockMetadataStore};
use crate::service::file_storage_service::FileStorageService;
use crate::storage::{BlobStore, mock_store::MockBlobStore};

/// Application state containing all services and their dependencies
#[derive(Clone)]
pub struct AppState {
    pub file_service: Arc<FileStorageService>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration.
    ///
    /// Fails if the blob directory or the metadata database cannot be opened.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        info!("Initializing application state with configuration");

        let blobs: Arc<dyn BlobStore> = config.storage.create_store()?;
        let metadata: Arc<dyn MetadataStore> = config.metadata.create_store()?;
        let file_service = Arc::new(FileStorageService::new(blobs, metadata));

        info!("Application state initialized successfully");
        Ok(Self { file_service, config })
    }

    /// Create application state for testing with mock backends
    pub fn new_for_testing() -> Self {
        let blobs: Arc<dyn BlobStore> = Arc::new(MockBlobStore::new());
        let metadata: Arc<dyn MetadataStore> = Arc::new(MockMetadataStore::new());

        Self {
            file_service: Arc::new(FileStorageService::new(blobs, metadata)),
            config: AppConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetadataBackend, StorageBackend};
    use crate::error::ErrorKind;
    use crate::service::file_storage_service::UploadedFile;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_config_with_real_backends() {
        let dir = TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.storage.base_dir = dir.path().join("uploads").to_string_lossy().into_owned();
        config.metadata.db_path = dir.path().join("meta.db").to_string_lossy().into_owned();

        let state = AppState::from_config(config).unwrap();
        let record = state
            .file_service
            .store(UploadedFile::from_bytes(Some("a.txt"), None, b"abc".to_vec()))
            .unwrap();
        assert!(dir.path().join("uploads").join(&record.storage_identifier).is_file());
    }

    #[test]
    fn test_from_config_fails_when_directory_cannot_be_created() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Local;
        config.storage.base_dir = blocker.join("uploads").to_string_lossy().into_owned();
        config.metadata.backend = MetadataBackend::Mock;

        let err = AppState::from_config(config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn test_new_for_testing_starts_empty() {
        let state = AppState::new_for_testing();
        assert!(state.file_service.list_all().unwrap().is_empty());
    }
}
