//! File storage service: the only writer of both the blob store and the
//! metadata store.
//!
//! Ordering rules:
//! * store: the blob is fully written and durable before its record exists
//! * delete: the blob is removed before its record
//!
//! A crash can therefore leave a record whose blob is gone, which is reported
//! as [`FileStoreError::MissingOnDisk`] on the next download.

use crate::checksum::{sha256_hex_reader, HashingReader};
use crate::error::{ErrorKind, FileStoreError, Result};
use crate::metadata::{FileId, FileRecord, MetadataStore, NewFileRecord};
use crate::storage::{BlobReader, BlobStore};
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::io::{self, BufRead, BufReader, Cursor, Read};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const DEFAULT_FILENAME: &str = "file";

/// An upload as handed over by the transport layer
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Box<dyn Read + Send>,
}

impl UploadedFile {
    pub fn new(
        filename: Option<String>,
        content_type: Option<String>,
        data: impl Read + Send + 'static,
    ) -> Self {
        Self {
            filename,
            content_type,
            data: Box::new(data),
        }
    }

    pub fn from_bytes(filename: Option<&str>, content_type: Option<&str>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(
            filename.map(str::to_string),
            content_type.map(str::to_string),
            Cursor::new(bytes.into()),
        )
    }
}

/// Open blob plus what the transport needs to frame it
pub struct Download {
    pub reader: BlobReader,
    pub filename: String,
    pub content_type: String,
    pub size: u64,
}

/// Result of re-digesting a stored blob
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub id: FileId,
    pub expected: String,
    pub actual: String,
    pub intact: bool,
}

/// Reduce a client-supplied name to a safe display name.
///
/// Backslashes count as separators, `.` and `..` segments are resolved and
/// only the last remaining segment is kept. Control characters are dropped.
pub fn sanitize_filename(name: Option<&str>) -> String {
    let raw = name.unwrap_or_default().replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments
        .last()
        .map(|s| s.chars().filter(|c| !c.is_control()).collect::<String>())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

fn normalize_content_type(content_type: Option<String>) -> String {
    content_type
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Orchestrates blob and metadata storage
pub struct FileStorageService {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl FileStorageService {
    /// Create a new service with injected backends
    pub fn new(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { blobs, metadata }
    }

    /// Persist an upload and create its record
    pub fn store(&self, upload: UploadedFile) -> Result<FileRecord> {
        let UploadedFile { filename, content_type, data } = upload;

        let mut data = BufReader::new(data);
        let is_empty = data
            .fill_buf()
            .map_err(|e| FileStoreError::storage("Failed to read upload", e))?
            .is_empty();
        if is_empty {
            warn!("Rejected empty upload (filename: {:?})", filename);
            return Err(FileStoreError::Validation("Empty file".to_string()));
        }

        let original_filename = sanitize_filename(filename.as_deref());
        let content_type = normalize_content_type(content_type);
        let storage_identifier = Uuid::new_v4().to_string();
        debug!("Storing {} ({}) as blob {}", original_filename, content_type, storage_identifier);

        let mut hashing = HashingReader::new(data);
        let size = self.blobs.put(&storage_identifier, &mut hashing)?;
        let bytes_read = hashing.bytes_read();
        let checksum = hashing.finalize_hex();

        if bytes_read != size {
            error!(
                "Blob {} stored {} bytes but {} were digested",
                storage_identifier, size, bytes_read
            );
            self.discard_blob(&storage_identifier);
            return Err(FileStoreError::storage(
                "Failed to store file",
                io::Error::new(io::ErrorKind::InvalidData, "stored size does not match digested size"),
            ));
        }

        let new_record = NewFileRecord {
            original_filename,
            content_type,
            size,
            checksum,
            storage_identifier: storage_identifier.clone(),
            upload_time: Utc::now(),
        };

        match self.metadata.create(new_record) {
            Ok(record) => {
                info!(
                    "Stored file {} ({}, {} bytes, sha256 {}) as blob {}",
                    record.id, record.original_filename, record.size, record.checksum, storage_identifier
                );
                Ok(record)
            }
            Err(e) => {
                error!("Failed to record metadata for blob {}: {}", storage_identifier, e);
                self.discard_blob(&storage_identifier);
                Err(e)
            }
        }
    }

    /// All records, read-only
    pub fn list_all(&self) -> Result<Vec<FileRecord>> {
        self.metadata.list_all()
    }

    pub fn get_by_id(&self, id: FileId) -> Result<FileRecord> {
        self.metadata.get(id).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                warn!("File not found: {}", id);
            }
            e
        })
    }

    /// Open the blob for a record and count the download
    pub fn load_for_download(&self, id: FileId) -> Result<Download> {
        let record = self.get_by_id(id)?;
        let reader = self.open_blob(&record)?;
        let record = self.metadata.increment_download_count(id)?;
        info!("File {} downloaded ({} total)", id, record.download_count);

        Ok(Download {
            reader,
            filename: record.original_filename,
            content_type: record.content_type,
            size: record.size,
        })
    }

    /// Remove the blob, then the record
    pub fn delete(&self, id: FileId) -> Result<()> {
        let record = self.get_by_id(id)?;
        self.blobs.delete(&record.storage_identifier)?;
        self.metadata.delete(id)?;
        info!("Deleted file {} (blob {})", id, record.storage_identifier);
        Ok(())
    }

    /// Re-digest the stored blob and compare with the recorded checksum
    pub fn verify(&self, id: FileId) -> Result<IntegrityReport> {
        let record = self.get_by_id(id)?;
        let reader = self.open_blob(&record)?;
        let actual = sha256_hex_reader(reader)
            .map_err(|e| FileStoreError::storage("Failed to read file", e))?;
        let intact = actual == record.checksum;
        if !intact {
            error!(
                "Checksum mismatch for file {} (blob {}): expected {}, got {}",
                id, record.storage_identifier, record.checksum, actual
            );
        }

        Ok(IntegrityReport {
            id,
            expected: record.checksum,
            actual,
            intact,
        })
    }

    fn open_blob(&self, record: &FileRecord) -> Result<BlobReader> {
        match self.blobs.get(&record.storage_identifier) {
            Ok(reader) => Ok(reader),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!(
                    "Consistency fault: file {} references missing blob {}",
                    record.id, record.storage_identifier
                );
                Err(FileStoreError::MissingOnDisk {
                    id: record.id,
                    storage_identifier: record.storage_identifier.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn discard_blob(&self, storage_identifier: &str) {
        if let Err(e) = self.blobs.delete(storage_identifier) {
            error!("Failed to clean up blob {}: {}", storage_identifier, e);
        }
    }
}
