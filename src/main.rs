use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod dashboard;
mod live_data;
mod models;

use config::Config;
use dashboard::AppState;
use live_data::{
    start_refresh_loop, Broadcaster, FootballDataClient, FootballDataSource, LiveDataService,
    SnapshotStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables take precedence
    dotenv::dotenv().ok();

    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    info!(
        "Following competition {} via {} (key {})",
        config.competition_id,
        config.football_data_api_url,
        config.masked_api_key()
    );

    let source: Arc<dyn FootballDataSource> = Arc::new(FootballDataClient::from_config(&config)?);
    let broadcaster = Broadcaster::new(SnapshotStore::new(), config.viewer_buffer);
    let service = LiveDataService::new(source, broadcaster.clone(), config.refresh_filter());

    let refresh_loop = start_refresh_loop(
        service.clone(),
        Duration::from_secs(config.update_interval_secs),
    );

    // Start the dashboard HTTP server
    let app = dashboard::router(AppState {
        service,
        masked_api_key: config.masked_api_key(),
    });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Open push connections end when the broadcaster closes, so graceful
    // shutdown does not wait on them forever.
    let closing = broadcaster.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
            closing.close().await;
        })
        .await?;

    refresh_loop.shutdown().await;
    info!("Stopped");
    Ok(())
}
