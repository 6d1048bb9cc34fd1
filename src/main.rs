use actix_web::{App, HttpServer, web};
use log::{error, info, warn};
use std::io;

use file_share::api;
use file_share::app_state::AppState;
use file_share::config::{AppConfig, ConfigSource, LoggingConfig};

/// log4rs from the configured file, env_logger if that file is unusable
fn init_logging(config: &LoggingConfig) {
    match log4rs::init_file(&config.config_file, Default::default()) {
        Ok(()) => info!("Logging configured from {}", config.config_file),
        Err(e) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
            warn!("Could not load log config {}: {}. Falling back to env_logger", config.config_file, e);
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // No logger exists yet, so a bad config file is reported through the returned error.
    let (config, source) =
        AppConfig::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    init_logging(&config.logging);
    match &source {
        ConfigSource::File(_) => info!("{}", source),
        ConfigSource::Defaults(_) => warn!("{}", source),
    }

    let state = AppState::from_config(config).map_err(|e| {
        error!("Startup failed: {}", e);
        io::Error::new(io::ErrorKind::Other, e.to_string())
    })?;
    let server = state.config.server.clone();
    let data = web::Data::new(state);

    info!("Starting server on {}:{}", server.host, server.port);
    let cors_config = server.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(api::cors(&cors_config))
            .wrap(actix_web::middleware::Logger::default())
            .app_data(data.clone())
            .configure(api::configure)
    })
    .workers(server.workers)
    .bind((server.host.as_str(), server.port))?
    .run()
    .await
}
