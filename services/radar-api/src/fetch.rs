//! File download.

use bytes::Bytes;
use radar_common::RadarError;
use reqwest::Client;
use tracing::{info, instrument};

use crate::config::HttpConfig;
use crate::listing::describe_reqwest_error;
use crate::metrics;

/// Build the HTTP client shared by listing and download.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, RadarError> {
    Client::builder()
        .timeout(config.request_timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(config.user_agent.clone())
        .pool_max_idle_per_host(2)
        .tcp_nodelay(true)
        .build()
        .map_err(|e| RadarError::Internal(format!("Failed to create HTTP client: {}", e)))
}

/// Downloads whole files into memory.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Bytes, RadarError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RadarError::fetch(url, describe_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RadarError::fetch(url, format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RadarError::fetch(url, describe_reqwest_error(&e)))?;

        metrics::record_download(body.len());
        info!(url = %url, bytes = body.len(), "Download completed");
        Ok(body)
    }
}
