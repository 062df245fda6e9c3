mod routes;
mod controllers;
mod services;
mod models;
mod api_docs;
mod shared_state;
mod config;
mod errors;

use std::net::SocketAddr;
use std::time::Duration;
use axum::{Router, routing::get, response::Html};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_scalar::Scalar;

use crate::api_docs::ApiDoc;
use crate::config::Config;
use crate::routes::solar_routes::api_routes;
use crate::shared_state::AppState;

#[tokio::main]
async fn main() {
    // 1. Load configuration
    let (config, config_path) = match Config::load_or_default() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return;
        }
    };

    // 2. Logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &config_path {
        Some(path) => info!(%path, "configuration loaded"),
        None => warn!("no configuration file found, using defaults"),
    }

    // 3. Shared state: PVGIS client + response caches
    let state = match AppState::new(&config) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to build PVGIS client");
            return;
        }
    };

    // 4. Background purge of expired cache entries
    let purge_state = state.clone();
    let purge_every = Duration::from_secs(config.cache.purge_interval_s);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_every);
        loop {
            ticker.tick().await;
            let removed = purge_state.proxy.purge_expired();
            if removed > 0 {
                info!(removed, "expired cache entries purged");
            }
        }
    });

    // 5. Start Axum HTTP server
    let app = Router::new()
        .nest("/api", api_routes(state))
        .route("/scalar", get(|| async {
            Html(Scalar::new(ApiDoc::openapi()).to_html())
        }))
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);
    info!(base_url = %config.pvgis.base_url, database = %config.pvgis.radiation_database, "PVGIS upstream");

    if let Err(e) = axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
    {
        error!(error = %e, "server stopped");
    }
}
