//! Blob Storage Layer Abstraction
//!
//! Blobs are opaque byte objects addressed by a system-generated key. This
//! module provides the storage trait plus a local filesystem backend and an
//! in-memory backend, so higher-level services never touch paths directly.

pub mod local_store;
pub mod mock_store;
pub mod config;


use std::io::Read;

use crate::error::{FileStoreError, Result};

/// Readable handle on a stored blob
pub type BlobReader = Box<dyn Read + Send>;

/// Trait defining the blob storage interface
pub trait BlobStore: Send + Sync {
    /// Write the whole stream under `key` and return the number of bytes stored.
    ///
    /// An existing object at `key` is replaced. On failure nothing is left behind.
    fn put(&self, key: &str, data: &mut dyn Read) -> Result<u64>;

    /// Open the object for reading; `NotFound` if absent
    fn get(&self, key: &str) -> Result<BlobReader>;

    /// Remove the object; absence is not an error
    fn delete(&self, key: &str) -> Result<()>;

    /// Check if an object exists
    fn exists(&self, key: &str) -> Result<bool>;
}

/// Reject keys that could escape the base directory or clash with partial writes.
pub fn validate_key(key: &str) -> Result<()> {
    let invalid = key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\', '\0'])
        || key.ends_with(local_store::PARTIAL_SUFFIX);
    if invalid {
        return Err(FileStoreError::Validation(format!("Invalid storage key: {:?}", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_accepts_uuid() {
        assert!(validate_key("4f1c2a5e-8b9d-4c3e-a1f0-123456789abc").is_ok());
    }

    #[test]
    fn test_validate_key_rejects_traversal() {
        for key in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", "x.part", "nul\0byte"] {
            assert!(validate_key(key).is_err(), "key {:?} should be rejected", key);
        }
    }
}
