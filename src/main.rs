use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod error;
mod handlers;
mod models;
mod policy;
mod service;
mod store;

use crate::config::Config;
use crate::service::InventoryService;
use crate::store::JsonFileStore;

/// Shared application state. The inventory itself lives in the store and is
/// reloaded by every operation; nothing here caches it.
#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<InventoryService>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (ignored in production where env vars are injected)
    dotenv::dotenv().ok();

    let config = Config::from_env()?;
    init_tracing(&config)?;

    let store = JsonFileStore::new(config.inventory_file.clone());
    info!(inventory_file = %store.path().display(), "Restock service starting");

    let state = AppState {
        inventory: Arc::new(InventoryService::new(Arc::new(store))),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Compact console logging, optionally mirrored to `LOG_FILE`.
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,restock_service=debug"));

    let file_layer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .init();

    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        // ── Health ──────────────────────────────────────────────────────────
        .route("/health", get(handlers::health))

        // ── Products ────────────────────────────────────────────────────────
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::add_product),
        )
        .route("/products/:id", get(handlers::products::get_product_status))
        .route(
            "/products/:id/purchase",
            post(handlers::products::purchase_product),
        )

        // ── Restock ─────────────────────────────────────────────────────────
        .route("/restock", post(handlers::restock::restock_all))

        // ── Middleware ──────────────────────────────────────────────────────
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
