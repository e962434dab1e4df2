mod config;
mod error;
mod handlers;
mod models;
mod rate_limit;
mod router;
mod state;

use anyhow::Context;
use config::GatewayConfig;
use enrichment::{BuildCache, Enricher};
use market_data::{MarketCheckClient, NhtsaClient};
use persistence::Stores;
use rate_limit::RateLimiter;
use router::create_router;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting Gateway API service");

    let config = GatewayConfig::from_env()?;

    // Unreachable store is the one failure that stops startup
    let stores = Stores::open(&config.store)
        .await
        .context("failed to open listing store")?;

    let source = Arc::new(MarketCheckClient::new(&config.provider)?);
    let catalog = Arc::new(NhtsaClient::new(&config.provider)?);

    let cache = Arc::new(BuildCache::new(config.build_cache.ttl));
    let sweeper = cache.start_sweeper(config.build_cache.sweep_interval);

    let state = AppState {
        rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
        enricher: Enricher::new(source, cache).with_repository(stores.listings.clone()),
        search_defaults: Arc::new(config.search.clone()),
        catalog,
        prices: stores.prices,
        listings: stores.listings,
    };

    let app = create_router(state);

    let listener = TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.shutdown().await;
    tracing::info!("Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
