//! Client for the vehicle-model lookup service (NHTSA vPIC).

use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::source::ModelCatalog;

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(rename = "Count", default)]
    count: u64,
    #[serde(rename = "Results", default)]
    results: Vec<ModelResult>,
}

#[derive(Debug, Deserialize)]
struct ModelResult {
    #[serde(rename = "Model_Name", default)]
    model_name: String,
}

#[derive(Clone)]
pub struct NhtsaClient {
    http: Client,
    base_url: String,
}

impl NhtsaClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.nhtsa_base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ModelCatalog for NhtsaClient {
    async fn models_for_make(&self, make: &str) -> Result<Vec<String>, ProviderError> {
        let make = make.trim();
        if make.is_empty() {
            return Err(ProviderError::InvalidRequest("make parameter cannot be empty".into()));
        }

        let endpoint = format!("{}/vehicles/GetModelsForMake/{}", self.base_url, make);
        let res = self
            .http
            .get(&endpoint)
            .query(&[("format", "json")])
            .send()
            .await?;

        if res.status() != StatusCode::OK {
            return Err(ProviderError::UnexpectedStatus {
                status: res.status().as_u16(),
                endpoint,
            });
        }

        let response: ModelsResponse = res.json().await?;
        if response.count == 0 {
            return Err(ProviderError::NotFound(format!("no models found for make: {make}")));
        }

        let models: BTreeSet<String> = response
            .results
            .into_iter()
            .map(|r| r.model_name)
            .filter(|name| !name.is_empty())
            .collect();

        debug!(make, models = models.len(), "Fetched models for make");
        Ok(models.into_iter().collect())
    }
}
