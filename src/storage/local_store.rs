//! Local filesystem blob storage implementation

use crate::error::{FileStoreError, Result};
use crate::storage::{validate_key, BlobReader, BlobStore};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use log::{debug, error, info, warn};

/// Suffix of in-flight writes; renamed away once the blob is complete
pub const PARTIAL_SUFFIX: &str = ".part";

/// Blob store rooted at a base directory, one file per key
pub struct LocalBlobStore {
    base_dir: PathBuf,
}

impl LocalBlobStore {
    /// Open the store, creating the base directory if needed.
    ///
    /// Failing to create the directory is fatal for the caller.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir).map_err(|e| {
            FileStoreError::storage(
                format!("Could not create storage directory: {}", base_dir.display()),
                e,
            )
        })?;
        let base_dir = base_dir.canonicalize().map_err(|e| {
            FileStoreError::storage(
                format!("Could not resolve storage directory: {}", base_dir.display()),
                e,
            )
        })?;
        info!("Using storage directory: {}", base_dir.display());
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve the on-disk path for a key
    pub fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.base_dir.join(key))
    }

    fn partial_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{}{}", key, PARTIAL_SUFFIX))
    }

    /// Copy into the partial file, make it durable, then move it into place
    fn write_object(&self, partial: &Path, target: &Path, data: &mut dyn Read) -> io::Result<u64> {
        let mut file = File::create(partial)?;
        let written = io::copy(data, &mut file)?;
        file.flush()?;
        file.sync_all()?;
        drop(file);
        fs::rename(partial, target)?;
        Ok(written)
    }

    fn discard_partial(&self, partial: &Path) {
        match fs::remove_file(partial) {
            Ok(()) => debug!("Removed partial blob {}", partial.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            // Logged only; the write error is what the caller needs to see.
            Err(e) => error!("Failed to remove partial blob {}: {}", partial.display(), e),
        }
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, key: &str, data: &mut dyn Read) -> Result<u64> {
        let target = self.object_path(key)?;
        let partial = self.partial_path(key);

        if target.exists() {
            warn!("Blob {} already exists and will be overwritten", key);
        }

        match self.write_object(&partial, &target, data) {
            Ok(size) => {
                info!("Wrote blob {} with size {}", key, size);
                Ok(size)
            }
            Err(e) => {
                error!("Failed to write blob {}: {}", key, e);
                self.discard_partial(&partial);
                Err(FileStoreError::storage("Failed to store file", e))
            }
        }
    }

    fn get(&self, key: &str) -> Result<BlobReader> {
        let path = self.object_path(key)?;
        match File::open(&path) {
            Ok(file) => {
                debug!("Opened blob {} for reading", key);
                Ok(Box::new(file))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(FileStoreError::not_found(format!("Blob not found: {}", key)))
            }
            Err(e) => Err(FileStoreError::storage("Failed to read file", e)),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("Deleted blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Blob {} already absent", key);
                Ok(())
            }
            Err(e) => Err(FileStoreError::storage("Failed to delete file from disk", e)),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let path = self.object_path(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FileStoreError::storage("Failed to inspect file", e)),
        }
    }
}
