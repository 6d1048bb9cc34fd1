//service/mod.rs
pub mod file_storage_service;

use actix_multipart::{Multipart, MultipartError};
use actix_web::error::PayloadError;
use actix_web::http::header::{
    self, Charset, ContentDisposition, DispositionParam, DispositionType, ExtendedValue,
};
use actix_web::{web, HttpRequest, HttpResponse};
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::io::{self, Cursor, Read};

use crate::app_state::AppState;
use crate::error::{FileStoreError, Result};
use crate::metadata::FileId;
use crate::service::file_storage_service::UploadedFile;
use crate::storage::BlobReader;

/// Header carrying the client's file name
pub const FILE_NAME_HEADER: &str = "X-File-Name";

/// Multipart part holding the uploaded file
pub const FILE_PART: &str = "file";

const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Run blocking storage work off the async workers, tagged for the log pattern
async fn run_blocking<F, T>(operation: &'static str, id: Option<FileId>, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        tag_request(operation, id);
        f()
    })
    .await
    .map_err(|e| {
        FileStoreError::storage("Storage task failed", io::Error::new(io::ErrorKind::Other, e))
    })?
}

// MDC is thread-local: this must run on the thread doing the work.
fn tag_request(operation: &str, id: Option<FileId>) {
    log_mdc::clear();
    log_mdc::insert("operation", operation);
    if let Some(id) = id {
        log_mdc::insert("file_id", id.to_string());
    }
}

/// File name from the `X-File-Name` header, else the `filename` query parameter
fn upload_filename(req: &HttpRequest) -> Option<String> {
    if let Some(name) = req.headers().get(FILE_NAME_HEADER).and_then(|h| h.to_str().ok()) {
        return Some(name.to_string());
    }
    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.get("filename").cloned())
}

fn upload_content_type(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
}

fn is_multipart(req: &HttpRequest) -> bool {
    upload_content_type(req)
        .map_or(false, |ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

fn attachment(filename: &str) -> ContentDisposition {
    // Plain parameter for old clients, RFC 5987 form for everything else.
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii() && c != '"' { c } else { '_' })
        .collect();
    ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![
            DispositionParam::Filename(ascii),
            DispositionParam::FilenameExt(ExtendedValue {
                charset: Charset::Ext("UTF-8".to_string()),
                language_tag: None,
                value: filename.as_bytes().to_vec(),
            }),
        ],
    }
}

fn payload_error(e: PayloadError) -> FileStoreError {
    FileStoreError::storage("Failed to read upload", io::Error::new(io::ErrorKind::Other, e.to_string()))
}

fn malformed_multipart(e: MultipartError) -> FileStoreError {
    FileStoreError::Validation(format!("Malformed multipart upload: {}", e))
}

/// Collect a body stream, failing once it passes `limit` bytes
async fn read_limited<S, E>(mut stream: S, limit: u64, on_error: fn(E) -> FileStoreError) -> Result<BytesMut>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
{
    let mut bytes = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(on_error)?;
        if (bytes.len() + chunk.len()) as u64 > limit {
            warn!("Upload exceeds the {} byte limit", limit);
            return Err(FileStoreError::Validation(format!(
                "File exceeds maximum upload size of {} bytes",
                limit
            )));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// The `file` part of a `multipart/form-data` body; other parts are drained and ignored
async fn read_file_part(mut multipart: Multipart, limit: u64) -> Result<UploadedFile> {
    let mut upload = None;
    while let Some(field) = multipart.next().await {
        let field = field.map_err(malformed_multipart)?;
        let name = field.name().map(str::to_string);
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.to_string());
        let bytes = read_limited(field, limit, malformed_multipart).await?;

        if upload.is_none() && name.as_deref() == Some(FILE_PART) {
            debug!("Multipart file part {:?}: {} bytes", filename, bytes.len());
            upload = Some(UploadedFile::new(filename, content_type, Cursor::new(bytes.freeze())));
        } else {
            debug!("Ignoring multipart part {:?}", name);
        }
    }
    upload.ok_or_else(|| FileStoreError::Validation(format!("Missing multipart part '{}'", FILE_PART)))
}

/// Blob bytes in fixed-size chunks, each read on the blocking pool
fn blob_stream(id: FileId, reader: BlobReader, size: u64) -> impl Stream<Item = Result<Bytes>> {
    futures::stream::try_unfold((reader, 0u64), move |(mut reader, sent)| async move {
        let (reader, chunk) = run_blocking("download", Some(id), move || {
            let mut buf = vec![0u8; DOWNLOAD_CHUNK_SIZE];
            let n = reader
                .read(&mut buf)
                .map_err(|e| FileStoreError::storage("Failed to read file", e))?;
            buf.truncate(n);
            Ok((reader, buf))
        })
        .await?;

        if chunk.is_empty() {
            if sent != size {
                warn!("File {} has {} bytes on disk but {} recorded", id, sent, size);
            }
            return Ok(None);
        }
        let sent = sent + chunk.len() as u64;
        Ok(Some((Bytes::from(chunk), (reader, sent))))
    })
}

/// Accepts `multipart/form-data` with a `file` part, or the raw bytes as the body
pub async fn upload_service(
    payload: web::Payload,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let limit = app_state.config.server.max_payload_size;

    let upload = if is_multipart(&req) {
        read_file_part(Multipart::new(req.headers(), payload), limit).await?
    } else {
        let filename = upload_filename(&req);
        debug!("Starting chunk load for upload {:?}", filename);
        let bytes = read_limited(payload, limit, payload_error).await?;
        UploadedFile::new(filename, upload_content_type(&req), Cursor::new(bytes.freeze()))
    };
    info!("Received upload {:?}", upload.filename);

    let service = app_state.file_service.clone();
    let record = run_blocking("upload", None, move || service.store(upload)).await?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn list_service(app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let service = app_state.file_service.clone();
    let records = run_blocking("list", None, move || service.list_all()).await?;
    debug!("Listing {} files", records.len());
    Ok(HttpResponse::Ok().json(records))
}

pub async fn metadata_service(id: FileId, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let service = app_state.file_service.clone();
    let record = run_blocking("metadata", Some(id), move || service.get_by_id(id)).await?;
    Ok(HttpResponse::Ok().json(record))
}

pub async fn download_service(id: FileId, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let service = app_state.file_service.clone();
    let download = run_blocking("download", Some(id), move || service.load_for_download(id)).await?;
    debug!("Streaming file {} ({} bytes)", id, download.size);

    Ok(HttpResponse::Ok()
        .content_type(download.content_type.as_str())
        .insert_header(attachment(&download.filename))
        .no_chunking(download.size)
        .streaming(blob_stream(id, download.reader, download.size)))
}

pub async fn delete_service(id: FileId, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let service = app_state.file_service.clone();
    run_blocking("delete", Some(id), move || service.delete(id)).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn verify_service(id: FileId, app_state: web::Data<AppState>) -> Result<HttpResponse> {
    let service = app_state.file_service.clone();
    let report = run_blocking("verify", Some(id), move || service.verify(id)).await?;
    Ok(HttpResponse::Ok().json(report))
}
