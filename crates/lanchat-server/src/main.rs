mod cleanup;
mod config;
mod listener;
mod routes;
mod storage;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use lanchat_gateway::engine::Engine;

use crate::config::ServerConfig;
use crate::routes::AppState;
use crate::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lanchat_server=debug,lanchat_gateway=debug,tower_http=debug".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let storage = Arc::new(Storage::new(config.uploads_dir.clone()).await?);

    let engine = Engine::spawn(config.gateway.clone());

    tokio::spawn(cleanup::run_cleanup_loop(
        storage.clone(),
        config.uploads_retention,
        config.cleanup_interval,
    ));

    let state = AppState {
        engine,
        storage: storage.clone(),
        max_file_size: config.max_file_size,
    };

    // Built client if present, else the plain public/ directory. Unknown
    // paths fall through to index.html for client-side routing.
    let static_dir = ["dist", "public"]
        .into_iter()
        .map(PathBuf::from)
        .find(|dir| dir.is_dir())
        .unwrap_or_else(|| PathBuf::from("public"));
    info!("Serving static client from {}", static_dir.display());
    let client = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let upload_limit = usize::try_from(config.max_file_size).unwrap_or(usize::MAX);

    let app = Router::new()
        .route("/gateway", get(routes::gateway))
        .route("/api/checkRoom", get(routes::check_room))
        .route("/upload", post(routes::upload).layer(DefaultBodyLimit::max(upload_limit)))
        .route("/health", get(routes::health))
        .nest_service("/uploads", ServeDir::new(storage.dir()))
        .fallback_service(client)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = listener::bind_available(config.addr()?, listener::PORT_ATTEMPTS).await?;
    info!("LAN chat server listening on {}", listener.local_addr()?);
    info!(
        "History retention {:?}, upload retention {:?}, cleanup every {:?}",
        config.gateway.history_retention, config.uploads_retention, config.cleanup_interval
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Cannot install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
