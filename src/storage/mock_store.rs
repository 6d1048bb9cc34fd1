//! Mock implementation of BlobStore for testing

use crate::error::{FileStoreError, Result};
use crate::storage::{validate_key, BlobReader, BlobStore};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex, MutexGuard};
use log::info;

/// In-memory blob store: key -> bytes
pub struct MockBlobStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.data.lock().map_err(|_| FileStoreError::poisoned("mock blob store"))
    }

    /// Get the number of stored objects
    pub fn object_count(&self) -> usize {
        self.lock().map(|data| data.len()).unwrap_or(0)
    }

    /// Clear all data from the store
    pub fn clear(&self) {
        if let Ok(mut data) = self.lock() {
            data.clear();
        }
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MockBlobStore {
    fn put(&self, key: &str, data: &mut dyn Read) -> Result<u64> {
        validate_key(key)?;
        // Buffer first so a failing stream never becomes visible.
        let mut buffer = Vec::new();
        data.read_to_end(&mut buffer)
            .map_err(|e| FileStoreError::storage("Failed to store file", e))?;
        let size = buffer.len() as u64;
        self.lock()?.insert(key.to_string(), buffer);
        info!("Mock: Wrote blob {} with size {}", key, size);
        Ok(size)
    }

    fn get(&self, key: &str) -> Result<BlobReader> {
        validate_key(key)?;
        match self.lock()?.get(key) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(FileStoreError::not_found(format!("Blob not found: {}", key))),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        if self.lock()?.remove(key).is_some() {
            info!("Mock: Deleted blob {}", key);
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.lock()?.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_mock_blob_store_basic_operations() {
        let store = MockBlobStore::new();
        assert_eq!(store.object_count(), 0);

        let size = store.put("k1", &mut Cursor::new(b"mock data".to_vec())).unwrap();
        assert_eq!(size, 9);
        assert!(store.exists("k1").unwrap());
        assert_eq!(store.object_count(), 1);

        let mut out = Vec::new();
        store.get("k1").unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"mock data");

        store.delete("k1").unwrap();
        assert!(!store.exists("k1").unwrap());

        store.put("k2", &mut Cursor::new(b"x".to_vec())).unwrap();
        store.clear();
        assert_eq!(store.object_count(), 0);
    }

    #[test]
    fn test_mock_blob_store_error_cases() {
        let store = MockBlobStore::new();
        assert_eq!(store.get("nope").err().map(|e| e.kind()), Some(ErrorKind::NotFound));
        store.delete("nope").unwrap();
        assert!(store.put("a/b", &mut Cursor::new(Vec::new())).is_err());
    }

    #[test]
    fn test_poisoned_lock_is_a_storage_error() {
        let store = std::sync::Arc::new(MockBlobStore::new());
        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.data.lock().unwrap();
            panic!("writer crashed while holding the lock");
        })
        .join();

        let err = store.exists("k1").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(store.object_count(), 0);
    }
}
