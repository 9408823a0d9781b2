//! # folio-api: Binary Entry Point
//!
//! Reads configuration from the environment, connects the optional
//! database, installs the Prometheus recorder and serves the API.

use anyhow::Context;
use folio_api::state::{AppConfig, AppState, LogFormat};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    init_tracing(config.log_format);

    let port = config.port;
    let db_pool = folio_api::db::init_pool(&config)
        .await
        .context("database initialization failed")?;

    let metrics = folio_api::middleware::metrics::install_recorder()
        .context("failed to install Prometheus recorder")?;

    let state = AppState::with_config(config, db_pool).with_metrics(metrics);
    state
        .hydrate_from_db()
        .await
        .context("database hydration failed")?;

    let app = folio_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Folio API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
