use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{InsightError, InsightResult};
use crate::services::urls::redact;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Asynchronous "GET a URL, get status and body" primitive the engine is
/// written against.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> InsightResult<FetchResponse>;
}

pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new(timeout_secs: u64) -> InsightResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| InsightError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> InsightResult<FetchResponse> {
        info!("GET {}", redact(url));

        let res = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                InsightError::Network(format!("Request timeout ({}): {}", redact(url), e))
            } else {
                InsightError::Network(format!("Request failed ({}): {}", redact(url), e))
            }
        })?;

        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| {
            warn!("Failed to read response body: {}", e);
            InsightError::Network(format!("Failed to read response body: {}", e))
        })?;

        Ok(FetchResponse { status, body })
    }
}
