use muac_core::store::FileStore;
use muac_core::{run_label_migration, Stores};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the MUAC application
///
/// Backfills severity codes on legacy label rows, then serves the REST API with Swagger UI.
///
/// # Environment Variables
/// - `MUAC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `MUAC_DATA_DIR`: Directory for the file store (default: "muac_data")
/// - `MUAC_SEVERE_THRESHOLD`, `MUAC_NORMAL_THRESHOLD`, `MUAC_MAX_VALUE`: classification
///   thresholds in centimetres (default: 11.5, 12.5 and 50)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, migration or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("muac=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("MUAC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let cfg = Arc::new(api_rest::config_from_env()?);

    tracing::info!("-- Data directory: {}", cfg.data_dir().display());
    tracing::info!(
        "-- Thresholds: severe < {} <= moderate < {} <= normal <= {}",
        cfg.thresholds().severe(),
        cfg.thresholds().normal(),
        cfg.thresholds().max_value()
    );

    let store = Arc::new(FileStore::open(cfg.data_dir())?);
    let stores = Stores::file(store)?;

    let migration = run_label_migration(&stores)?;
    tracing::info!(
        "-- Backfilled {} severity labels and {} recommendations",
        migration.severity_labels.updated,
        migration.recommendations.updated
    );

    api_rest::serve(&rest_addr, api_rest::AppState::new(cfg, stores)).await
}
