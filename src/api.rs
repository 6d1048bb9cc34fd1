// src/api.rs
//
// Route declarations. All work happens in `service`.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{delete, get, post, web, HttpRequest, HttpResponse};

use crate::app_state::AppState;
use crate::config::ServerConfig;
use crate::error::FileStoreError;
use crate::metadata::FileId;
use crate::service::{
    delete_service, download_service, list_service, metadata_service, upload_service, verify_service,
};

#[post("/files")]
pub async fn upload(
    payload: web::Payload,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, FileStoreError> {
    upload_service(payload, req, app_state).await
}

#[get("/files")]
pub async fn list(app_state: web::Data<AppState>) -> Result<HttpResponse, FileStoreError> {
    list_service(app_state).await
}

#[get("/files/{id}")]
pub async fn file_metadata(
    path: web::Path<FileId>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, FileStoreError> {
    metadata_service(path.into_inner(), app_state).await
}

#[get("/files/{id}/download")]
pub async fn download(
    path: web::Path<FileId>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, FileStoreError> {
    download_service(path.into_inner(), app_state).await
}

#[get("/files/{id}/verify")]
pub async fn verify(
    path: web::Path<FileId>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, FileStoreError> {
    verify_service(path.into_inner(), app_state).await
}

#[delete("/files/{id}")]
pub async fn remove(
    path: web::Path<FileId>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, FileStoreError> {
    delete_service(path.into_inner(), app_state).await
}

/// Register every file route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(upload)
        .service(list)
        .service(file_metadata)
        .service(download)
        .service(verify)
        .service(remove);
}

/// CORS policy for browser clients served from another origin
pub fn cors(config: &ServerConfig) -> Cors {
    let cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .expose_headers([header::CONTENT_DISPOSITION])
        .max_age(3600);
    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return cors.allow_any_origin();
    }
    config
        .allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
