//! Remote configuration fetcher.
//!
//! One request per call and no retries; callers decide how to fall back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;

use crate::errors::AppError;
use crate::models::ConfigurationDocument;

/// Path of the configuration endpoint relative to the API base URL.
pub const CONFIG_ENDPOINT: &str = "/api/MobileControllerGPIRN/v1/iphone/GPIConfig";

/// Default upper bound for a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    async fn fetch(&self) -> Result<ConfigurationDocument, AppError>;
}

/// Fetches the configuration document over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConfigFetcher {
    client: Client,
    url: String,
}

impl HttpConfigFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), CONFIG_ENDPOINT),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ConfigFetcher for HttpConfigFetcher {
    async fn fetch(&self) -> Result<ConfigurationDocument, AppError> {
        tracing::debug!("GET {}", self.url);

        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let document: ConfigurationDocument = response.json().await?;
        document.validate()?;

        tracing::info!("Fetched configuration {}", document.version_tag());
        Ok(document)
    }
}
