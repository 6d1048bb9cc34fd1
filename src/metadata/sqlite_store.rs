//! SQLite implementation of MetadataStore trait

use crate::error::{FileStoreError, Result};
use crate::metadata::{FileId, FileRecord, MetadataStore, NewFileRecord};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use log::{debug, info, warn};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        original_filename TEXT NOT NULL,
        content_type TEXT NOT NULL,
        size INTEGER NOT NULL,
        checksum TEXT NOT NULL,
        storage_filename TEXT NOT NULL UNIQUE,
        upload_time TEXT NOT NULL,
        download_count INTEGER NOT NULL DEFAULT 0
    )";

const SELECT_COLUMNS: &str = "SELECT id, original_filename, content_type, size, checksum, \
     storage_filename, upload_time, download_count FROM files";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let upload_time: String = row.get(6)?;
    let upload_time = DateTime::parse_from_rfc3339(&upload_time)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let size: i64 = row.get(3)?;
    let download_count: i64 = row.get(7)?;

    Ok(FileRecord {
        id: row.get(0)?,
        original_filename: row.get(1)?,
        content_type: row.get(2)?,
        size: size as u64,
        checksum: row.get(4)?,
        storage_identifier: row.get(5)?,
        upload_time,
        download_count: download_count as u64,
    })
}

fn query_by_id(conn: &Connection, id: FileId) -> Result<Option<FileRecord>> {
    let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
    Ok(conn.query_row(&sql, params![id], row_to_record).optional()?)
}

fn not_found(id: FileId) -> FileStoreError {
    FileStoreError::not_found(format!("File not found: {}", id))
}

/// SQLite implementation of MetadataStore
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(db_path: impl AsRef<Path>, wal_mode: bool) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                FileStoreError::storage(
                    format!("Could not create metadata directory: {}", parent.display()),
                    e,
                )
            })?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        if wal_mode {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            if !mode.eq_ignore_ascii_case("wal") {
                warn!("Requested WAL mode but SQLite reports journal_mode={}", mode);
            }
        }
        info!("Opened metadata database at {}", db_path.display());
        Self::with_connection(conn)
    }

    /// Database living only as long as this store
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FileStoreError::poisoned("metadata connection"))
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn create(&self, record: NewFileRecord) -> Result<FileRecord> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO files (original_filename, content_type, size, checksum, storage_filename, upload_time, download_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
            params![
                record.original_filename,
                record.content_type,
                record.size as i64,
                record.checksum,
                record.storage_identifier,
                record.upload_time.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => FileStoreError::Validation(format!(
                "Storage identifier already in use: {}",
                record.storage_identifier
            )),
            _ => FileStoreError::Metadata(e),
        })?;

        let id = conn.last_insert_rowid();
        debug!("Inserted file record {} for blob {}", id, record.storage_identifier);
        // Re-read so callers see exactly what later reads will return.
        query_by_id(&conn, id)?.ok_or_else(|| not_found(id))
    }

    fn get(&self, id: FileId) -> Result<FileRecord> {
        let conn = self.lock()?;
        query_by_id(&conn, id)?.ok_or_else(|| not_found(id))
    }

    fn get_by_storage_identifier(&self, storage_identifier: &str) -> Result<Option<FileRecord>> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE storage_filename = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![storage_identifier], row_to_record).optional()?)
    }

    fn list_all(&self) -> Result<Vec<FileRecord>> {
        let conn = self.lock()?;
        let sql = format!("{} ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn update(&self, record: &FileRecord) -> Result<()> {
        let conn = self.lock()?;
        let current = query_by_id(&conn, record.id)?.ok_or_else(|| not_found(record.id))?;
        if record.download_count < current.download_count {
            return Err(FileStoreError::Validation(format!(
                "Download count for file {} cannot decrease ({} -> {})",
                record.id, current.download_count, record.download_count
            )));
        }
        conn.execute(
            "UPDATE files SET download_count = ?1 WHERE id = ?2",
            params![record.download_count as i64, record.id],
        )?;
        Ok(())
    }

    fn increment_download_count(&self, id: FileId) -> Result<FileRecord> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE files SET download_count = download_count + 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(not_found(id));
        }
        query_by_id(&conn, id)?.ok_or_else(|| not_found(id))
    }

    fn delete(&self, id: FileId) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM files WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(not_found(id));
        }
        debug!("Deleted file record {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn new_record(storage_identifier: &str) -> NewFileRecord {
        NewFileRecord {
            original_filename: "report.pdf".into(),
            content_type: "application/pdf".into(),
            size: 1024,
            checksum: "ab".repeat(32),
            storage_identifier: storage_identifier.into(),
            upload_time: Utc::now(),
        }
    }

    #[test]
    fn test_sqlite_metadata_store_basic_operations() {
        let store = SqliteMetadataStore::in_memory().unwrap();

        let created = store.create(new_record("blob-1")).unwrap();
        assert_eq!(created.download_count, 0);
        assert_eq!(store.get(created.id).unwrap(), created);

        let by_key = store.get_by_storage_identifier("blob-1").unwrap();
        assert_eq!(by_key, Some(created.clone()));
        assert_eq!(store.get_by_storage_identifier("nope").unwrap(), None);

        let bumped = store.increment_download_count(created.id).unwrap();
        assert_eq!(bumped.download_count, 1);

        let mut updated = bumped.clone();
        updated.download_count = 5;
        store.update(&updated).unwrap();
        assert_eq!(store.get(created.id).unwrap().download_count, 5);

        store.delete(created.id).unwrap();
        assert_eq!(store.get(created.id).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let first = store.create(new_record("blob-a")).unwrap();
        store.delete(first.id).unwrap();
        let second = store.create(new_record("blob-b")).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_sqlite_metadata_store_error_cases() {
        let store = SqliteMetadataStore::in_memory().unwrap();

        assert_eq!(store.get(99).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.delete(99).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.increment_download_count(99).unwrap_err().kind(), ErrorKind::NotFound);

        let created = store.create(new_record("dup")).unwrap();
        let err = store.create(new_record("dup")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        store.increment_download_count(created.id).unwrap();
        let mut stale = created.clone();
        stale.download_count = 0;
        assert_eq!(store.update(&stale).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("nested").join("metadata.db");

        let id = {
            let store = SqliteMetadataStore::open(&db_path, true).unwrap();
            let record = store.create(new_record("persisted")).unwrap();
            store.increment_download_count(record.id).unwrap();
            record.id
        };

        let store = SqliteMetadataStore::open(&db_path, true).unwrap();
        let record = store.get(id).unwrap();
        assert_eq!(record.storage_identifier, "persisted");
        assert_eq!(record.download_count, 1);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_list_all_is_ordered_by_id() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        for i in 0..5 {
            store.create(new_record(&format!("blob-{}", i))).unwrap();
        }
        let ids: Vec<FileId> = store.list_all().unwrap().iter().map(|r| r.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(store.list_all().unwrap(), store.list_all().unwrap());
    }

    #[test]
    fn test_poisoned_lock_is_a_storage_error() {
        let store = std::sync::Arc::new(SqliteMetadataStore::in_memory().unwrap());
        let holder = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.conn.lock().unwrap();
            panic!("writer crashed while holding the lock");
        })
        .join();

        let err = store.list_all().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }
}
