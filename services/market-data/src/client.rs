//! REST client for the market-data provider
//!
//! Every request carries the API key as a query parameter. The key is never
//! part of the endpoint string, so it does not leak into error messages.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use types::build::BuildSpec;
use types::ids::Vin;
use types::listing::Listing;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::source::{ListingQuery, MarketDataSource};

#[derive(Debug, Deserialize)]
struct ActiveListingsResponse {
    #[serde(default)]
    listings: Vec<Listing>,
}

/// Client for the provider's search, listing and decode endpoints.
#[derive(Clone)]
pub struct MarketCheckClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl MarketCheckClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.marketcheck_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: String,
        params: &[(&'static str, String)],
    ) -> Result<T, ProviderError> {
        let res = self
            .http
            .get(&endpoint)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        match res.status() {
            StatusCode::OK => Ok(res.json::<T>().await?),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound(endpoint)),
            status => Err(ProviderError::UnexpectedStatus {
                status: status.as_u16(),
                endpoint,
            }),
        }
    }
}

#[async_trait]
impl MarketDataSource for MarketCheckClient {
    async fn active_listings(&self, query: &ListingQuery) -> Result<Vec<Listing>, ProviderError> {
        let endpoint = format!("{}/search/car/active", self.base_url);
        let response: ActiveListingsResponse = self.get_json(endpoint, &query.params()).await?;

        debug!(
            rows = query.rows,
            returned = response.listings.len(),
            "Fetched active listings"
        );
        Ok(response.listings)
    }

    async fn listing_by_id(&self, id: &str) -> Result<Listing, ProviderError> {
        if id.trim().is_empty() {
            return Err(ProviderError::InvalidRequest("listing id cannot be empty".into()));
        }
        let endpoint = format!("{}/listing/car/{}", self.base_url, id.trim());
        self.get_json(endpoint, &[]).await
    }

    async fn decode_build(&self, vin: &Vin) -> Result<BuildSpec, ProviderError> {
        if vin.is_empty() {
            return Err(ProviderError::InvalidRequest("VIN cannot be empty".into()));
        }
        let endpoint = format!("{}/decode/car/{}/specs", self.base_url, vin);
        self.get_json(endpoint, &[]).await
    }
}
