#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the noise map application.
//!
//! Serves the REST API for recording noise samples and querying them by
//! area, owner history, and area statistics. Newly recorded samples are
//! pushed to connected clients over a Server-Sent Events stream at
//! `/api/noise/stream`.

pub mod auth;
pub mod config;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::error::InternalError;
use actix_web::http::header;
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use noise_map_database::{PostgisStore, db, run_migrations};
use noise_map_query::NoiseQueryService;
use noise_map_server_models::ApiError;
use noise_map_store::NoiseSampleStore;
use noise_map_store::memory::MemoryStore;

use crate::config::{ServerConfig, StoreBackend};

/// Shared application state.
pub struct AppState {
    /// Query service over the configured store.
    pub service: NoiseQueryService,
}

/// Registers the `/api` routes and the JSON body error handler.
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json_config = web::JsonConfig::default().error_handler(|err, _req| {
        let message = format!("Invalid request body: {err}");
        InternalError::from_response(err, HttpResponse::BadRequest().json(ApiError::new(message)))
            .into()
    });

    cfg.app_data(json_config).service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/noise")
                    .route("/record", web::post().to(handlers::record))
                    .route("/area", web::get().to(handlers::area))
                    .route("/history", web::get().to(handlers::history))
                    .route("/statistics", web::get().to(handlers::statistics))
                    .route("/stream", web::get().to(handlers::stream)),
            ),
    );
}

/// Opens the store adapter selected by `config`.
///
/// For `PostGIS` this connects, applies the server-side statement timeout,
/// and runs pending migrations.
///
/// # Errors
///
/// Returns an error if the database connection or migrations fail.
pub async fn open_store(
    config: &ServerConfig,
) -> Result<Arc<dyn NoiseSampleStore>, Box<dyn std::error::Error>> {
    match config.store_backend {
        StoreBackend::Postgis => {
            log::info!("Connecting to database...");
            let db_conn = db::connect(&config.database_url, config.store_timeout).await?;

            log::info!("Running migrations...");
            run_migrations(db_conn.as_ref()).await?;

            Ok(Arc::new(PostgisStore::new(Arc::from(db_conn))))
        }
        StoreBackend::Memory => {
            log::warn!("Using in-memory store; samples will not survive a restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn cors(frontend_url: Option<&str>) -> Cors {
    frontend_url.map_or_else(Cors::permissive, |origin| {
        Cors::default()
            .allowed_origin(origin)
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::HeaderName::from_static("x-user-id"),
            ])
            .max_age(3600)
    })
}

/// Starts the noise map API server.
///
/// Reads [`ServerConfig`] from the environment, opens the configured
/// store, and starts the Actix-Web HTTP server. The caller is responsible
/// for providing the async runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the configuration is invalid, the
/// store cannot be opened, or the HTTP server fails to bind or encounters
/// a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = ServerConfig::from_env().map_err(std::io::Error::other)?;

    let store = open_store(&config)
        .await
        .map_err(|e| std::io::Error::other(format!("Failed to open store: {e}")))?;

    let service = NoiseQueryService::new(store)
        .with_default_radius(config.default_radius_meters)
        .with_store_timeout(config.store_timeout);

    let state = web::Data::new(AppState { service });
    let frontend_url = config.frontend_url.clone();

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(cors(frontend_url.as_deref()))
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await
}
