// Housing Stats - Web Server
// Loads the dataset once, then serves /price, /ela and /plot

use anyhow::{Context, Result};
use housing_stats::api::{router, AppState};
use housing_stats::{Config, Dataset};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    // Fails fast: a missing file or bad date aborts startup
    let dataset = Dataset::load(&config.data_path)?;
    let state = AppState::new(dataset);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(version = housing_stats::VERSION, "server listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}
