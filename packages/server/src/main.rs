use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog_server::config::AppConfig;
use catalog_server::database::init_db;
use catalog_server::state::AppState;
use catalog_server::storage::build_blob_store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = init_db(&config.database)
        .await
        .context("Failed to initialize database")?;
    let blobs = build_blob_store(&config.storage).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = catalog_server::build_router(AppState::new(config, db, blobs));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Server running at http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutting down");
}
