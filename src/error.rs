//! Error types shared by the blob store, the metadata store and the file service.
//!
//! Every operation returns a [`FileStoreError`]; callers that only care about the
//! outward classification use [`FileStoreError::kind`].

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, FileStoreError>;

/// Caller-visible failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Storage,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum FileStoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{message}: {source}")]
    Storage {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    NotFound(String),

    /// The record exists but its blob is gone.
    #[error("Stored file missing on disk (id: {id}, storage identifier: {storage_identifier})")]
    MissingOnDisk { id: i64, storage_identifier: String },

    #[error("Metadata store error: {0}")]
    Metadata(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FileStoreError {
    pub fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        FileStoreError::Storage {
            message: message.into(),
            source,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        FileStoreError::NotFound(message.into())
    }

    /// A lock whose holder panicked; the guarded state may be half-written.
    pub fn poisoned(what: &str) -> Self {
        FileStoreError::storage(
            format!("Lock on {} is poisoned", what),
            std::io::Error::new(std::io::ErrorKind::Other, "a previous holder panicked"),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FileStoreError::Validation(_) => ErrorKind::Validation,
            FileStoreError::NotFound(_) | FileStoreError::MissingOnDisk { .. } => ErrorKind::NotFound,
            FileStoreError::Storage { .. }
            | FileStoreError::Metadata(_)
            | FileStoreError::Config(_) => ErrorKind::Storage,
        }
    }

    /// True for faults where metadata and disk disagree
    pub fn is_consistency_fault(&self) -> bool {
        matches!(self, FileStoreError::MissingOnDisk { .. })
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorKind,
    message: &'a str,
}

impl ResponseError for FileStoreError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // The missing-on-disk detail stays in the logs; clients see the short form.
        let message = match self {
            FileStoreError::MissingOnDisk { .. } => "Stored file missing on disk".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.kind(),
            message: &message,
        })
    }
}
