use crate::rate_limit::RateLimitConfig;
use anyhow::Context;
use enrichment::{BuildCacheConfig, SearchDefaults};
use market_data::ProviderConfig;
use persistence::StoreConfig;
use std::net::SocketAddr;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Everything the gateway reads from the environment at startup.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub listen_addr: SocketAddr,
    pub provider: ProviderConfig,
    pub store: StoreConfig,
    pub rate_limit: RateLimitConfig,
    pub build_cache: BuildCacheConfig,
    pub search: SearchDefaults,
}

impl GatewayConfig {
    /// # Environment Variables
    /// - `LISTEN_ADDR`: bind address (default: 0.0.0.0:8080)
    ///
    /// plus those read by each component's own `from_env`.
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .context("LISTEN_ADDR must be a socket address")?;

        Ok(Self {
            listen_addr,
            provider: ProviderConfig::from_env()?,
            store: StoreConfig::from_env(),
            rate_limit: RateLimitConfig::from_env(),
            build_cache: BuildCacheConfig::from_env(),
            search: SearchDefaults::from_env(),
        })
    }
}
