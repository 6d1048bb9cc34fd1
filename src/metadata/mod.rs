//! Metadata Storage Layer Abstraction
//!
//! This module owns the [`FileRecord`] model and the [`MetadataStore`] trait.
//! Implementations do pure bookkeeping and never touch blob files, so the
//! record store can be backed by SQLite, an in-memory map, or anything else
//! with single-record atomicity.

pub mod sqlite_store;
pub mod mock_store;
pub mod config;

#[cfg(test)]
mod comprehensive_test;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Record identifier type
pub type FileId = i64;

/// Metadata describing one stored file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Assigned by the store on creation
    pub id: FileId,
    /// Sanitized display name, never used to address storage
    pub original_filename: String,
    pub content_type: String,
    /// Number of bytes written at creation
    pub size: u64,
    /// Hex SHA-256 of the stored bytes
    pub checksum: String,
    /// Blob key, unique and never reused
    #[serde(rename = "storageFilename")]
    pub storage_identifier: String,
    pub upload_time: DateTime<Utc>,
    pub download_count: u64,
}

/// A record that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileRecord {
    pub original_filename: String,
    pub content_type: String,
    pub size: u64,
    pub checksum: String,
    pub storage_identifier: String,
    pub upload_time: DateTime<Utc>,
}

impl NewFileRecord {
    /// Attach an id; download counters always start at zero
    pub fn into_record(self, id: FileId) -> FileRecord {
        FileRecord {
            id,
            original_filename: self.original_filename,
            content_type: self.content_type,
            size: self.size,
            checksum: self.checksum,
            storage_identifier: self.storage_identifier,
            upload_time: self.upload_time,
            download_count: 0,
        }
    }
}

/// Trait defining the metadata storage interface
pub trait MetadataStore: Send + Sync {
    /// Persist a new record and return it with its assigned id
    fn create(&self, record: NewFileRecord) -> Result<FileRecord>;

    /// Fetch a record; `NotFound` if absent
    fn get(&self, id: FileId) -> Result<FileRecord>;

    /// Look up the record owning a blob key
    fn get_by_storage_identifier(&self, storage_identifier: &str) -> Result<Option<FileRecord>>;

    /// All records in ascending id order
    fn list_all(&self) -> Result<Vec<FileRecord>>;

    /// Persist the mutable part of a record (its download counter).
    ///
    /// Fails with `NotFound` if the record is gone and with `Validation` if the
    /// counter would go backwards.
    fn update(&self, record: &FileRecord) -> Result<()>;

    /// Atomically bump the download counter and return the updated record
    fn increment_download_count(&self, id: FileId) -> Result<FileRecord>;

    /// Remove a record; `NotFound` if absent
    fn delete(&self, id: FileId) -> Result<()>;
}
