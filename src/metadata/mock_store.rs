//! Mock implementation of MetadataStore trait for testing

use crate::error::{FileStoreError, Result};
use crate::metadata::{FileId, FileRecord, MetadataStore, NewFileRecord};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

struct Records {
    next_id: FileId,
    by_id: BTreeMap<FileId, FileRecord>,
}

/// Mock implementation of MetadataStore for testing
pub struct MockMetadataStore {
    data: Mutex<Records>,
}

impl MockMetadataStore {
    /// Create a new mock metadata store
    pub fn new() -> Self {
        Self {
            data: Mutex::new(Records {
                next_id: 1,
                by_id: BTreeMap::new(),
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Records>> {
        self.data.lock().map_err(|_| FileStoreError::poisoned("mock metadata store"))
    }

    /// Get the number of records in the store
    pub fn record_count(&self) -> usize {
        self.lock().map(|data| data.by_id.len()).unwrap_or(0)
    }

    /// Clear all records; ids keep counting up
    pub fn clear(&self) {
        if let Ok(mut data) = self.lock() {
            data.by_id.clear();
        }
    }
}

impl Default for MockMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: FileId) -> FileStoreError {
    FileStoreError::not_found(format!("File not found: {}", id))
}

impl MetadataStore for MockMetadataStore {
    fn create(&self, record: NewFileRecord) -> Result<FileRecord> {
        let mut data = self.lock()?;
        if data.by_id.values().any(|r| r.storage_identifier == record.storage_identifier) {
            return Err(FileStoreError::Validation(format!(
                "Storage identifier already in use: {}",
                record.storage_identifier
            )));
        }

        let id = data.next_id;
        data.next_id += 1;
        let record = record.into_record(id);
        data.by_id.insert(id, record.clone());
        Ok(record)
    }

    fn get(&self, id: FileId) -> Result<FileRecord> {
        self.lock()?.by_id.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    fn get_by_storage_identifier(&self, storage_identifier: &str) -> Result<Option<FileRecord>> {
        Ok(self
            .lock()?
            .by_id
            .values()
            .find(|r| r.storage_identifier == storage_identifier)
            .cloned())
    }

    fn list_all(&self) -> Result<Vec<FileRecord>> {
        Ok(self.lock()?.by_id.values().cloned().collect())
    }

    fn update(&self, record: &FileRecord) -> Result<()> {
        let mut data = self.lock()?;
        let current = data.by_id.get_mut(&record.id).ok_or_else(|| not_found(record.id))?;
        if record.download_count < current.download_count {
            return Err(FileStoreError::Validation(format!(
                "Download count for file {} cannot decrease ({} -> {})",
                record.id, current.download_count, record.download_count
            )));
        }
        current.download_count = record.download_count;
        Ok(())
    }

    fn increment_download_count(&self, id: FileId) -> Result<FileRecord> {
        let mut data = self.lock()?;
        let current = data.by_id.get_mut(&id).ok_or_else(|| not_found(id))?;
        current.download_count += 1;
        Ok(current.clone())
    }

    fn delete(&self, id: FileId) -> Result<()> {
        self.lock()?.by_id.remove(&id).map(|_| ()).ok_or_else(|| not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::Utc;

    fn new_record(storage_identifier: &str) -> NewFileRecord {
        NewFileRecord {
            original_filename: "notes.md".into(),
            content_type: "text/markdown".into(),
            size: 12,
            checksum: "cd".repeat(32),
            storage_identifier: storage_identifier.into(),
            upload_time: Utc::now(),
        }
    }

    #[test]
    fn test_mock_metadata_store_basic_operations() {
        let store = MockMetadataStore::new();
        assert_eq!(store.record_count(), 0);

        let first = store.create(new_record("m-1")).unwrap();
        let second = store.create(new_record("m-2")).unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.record_count(), 2);

        assert_eq!(store.get(first.id).unwrap(), first);
        assert_eq!(store.get_by_storage_identifier("m-2").unwrap(), Some(second.clone()));
        assert_eq!(store.list_all().unwrap(), vec![first.clone(), second.clone()]);

        assert_eq!(store.increment_download_count(first.id).unwrap().download_count, 1);
        assert_eq!(store.increment_download_count(first.id).unwrap().download_count, 2);

        store.delete(first.id).unwrap();
        assert_eq!(store.record_count(), 1);

        store.clear();
        let third = store.create(new_record("m-3")).unwrap();
        assert_eq!(third.id, 3);
    }

    #[test]
    fn test_mock_metadata_store_error_cases() {
        let store = MockMetadataStore::new();

        assert_eq!(store.get(1).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.delete(1).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.increment_download_count(1).unwrap_err().kind(), ErrorKind::NotFound);

        let record = store.create(new_record("dup")).unwrap();
        assert_eq!(store.create(new_record("dup")).unwrap_err().kind(), ErrorKind::Validation);

        let mut ahead = record.clone();
        ahead.download_count = 3;
        store.update(&ahead).unwrap();
        assert_eq!(store.update(&record).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_poisoned_lock_is_a_storage_error() {
        let store = std::sync::Arc::new(MockMetadataStore::new());
        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.data.lock().unwrap();
            panic!("writer crashed while holding the lock");
        })
        .join();

        let err = store.list_all().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(store.record_count(), 0);
    }
}
