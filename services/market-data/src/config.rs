use std::time::Duration;

use crate::error::ProviderError;

pub const DEFAULT_MARKETCHECK_BASE_URL: &str = "https://marketcheck-prod.apigee.net/v1";
pub const DEFAULT_NHTSA_BASE_URL: &str = "https://vpic.nhtsa.dot.gov/api";
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Connection settings for the outbound provider clients.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub marketcheck_base_url: String,
    pub nhtsa_base_url: String,
    pub timeout: Duration,
}

impl ProviderConfig {
    /// Load provider settings from the environment.
    ///
    /// # Environment Variables
    /// - `MARKETCHECK_API_KEY`: provider API key (required)
    /// - `MARKETCHECK_BASE_URL`: provider base URL
    /// - `NHTSA_BASE_URL`: model lookup base URL
    /// - `PROVIDER_TIMEOUT_SECS`: per-request timeout (default: 10)
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("MARKETCHECK_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Config("MARKETCHECK_API_KEY environment variable is required".into())
            })?;

        let marketcheck_base_url = std::env::var("MARKETCHECK_BASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_MARKETCHECK_BASE_URL.to_string());

        let nhtsa_base_url = std::env::var("NHTSA_BASE_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_NHTSA_BASE_URL.to_string());

        let timeout = Duration::from_secs(
            std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
        );

        Ok(Self {
            api_key,
            marketcheck_base_url,
            nhtsa_base_url,
            timeout,
        })
    }

    /// Settings pointing both clients at a single base URL.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            api_key: api_key.into(),
            marketcheck_base_url: base_url.clone(),
            nhtsa_base_url: base_url,
            timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }
}
