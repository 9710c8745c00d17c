//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! Useful for development and debugging against a scratch data directory. The workspace's main
//! `muac-run` binary also loads `.env` and backfills legacy label rows before serving.

use muac_core::store::FileStore;
use muac_core::Stores;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("MUAC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = Arc::new(api_rest::config_from_env()?);
    tracing::info!("-- Data directory: {}", cfg.data_dir().display());

    let store = Arc::new(FileStore::open(cfg.data_dir())?);
    let stores = Stores::file(store)?;

    api_rest::serve(&addr, api_rest::AppState::new(cfg, stores)).await
}
