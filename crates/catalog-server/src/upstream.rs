//! Authenticated fetch of the full catalog from the upstream provider.

use std::time::Duration;

use async_trait::async_trait;
use catalog_core::CatalogError;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use crate::config::UpstreamConfig;

/// Source of the raw catalog payload.
///
/// One call performs one fetch. Implementations do not retry; the next scheduled
/// or manual refresh is the retry.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<u8>, CatalogError>;
}

/// Fetches the catalog over HTTP with Basic credentials.
pub struct HttpCatalogSource {
    client: reqwest::Client,
    url: String,
    username: String,
    password: Option<String>,
    timeout: Duration,
}

impl HttpCatalogSource {
    pub fn new(config: &UpstreamConfig) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CatalogError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.timeout(),
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<u8>, CatalogError> {
        let password = self
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| CatalogError::config("upstream password is not set"))?;

        let response = self
            .client
            .get(&self.url)
            .basic_auth(&self.username, Some(password))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CatalogError::transport(format!(
                        "upstream request timed out after {} seconds",
                        self.timeout.as_secs_f64()
                    ))
                } else if e.is_connect() {
                    CatalogError::transport(format!("failed to connect to upstream: {e}"))
                } else {
                    CatalogError::transport(format!("upstream request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(CatalogError::upstream(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::transport(format!("failed to read upstream body: {e}")))?;
        debug!(bytes = body.len(), "upstream catalog received");
        Ok(body.to_vec())
    }
}
