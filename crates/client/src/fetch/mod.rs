//! HTTP fetch pipeline for the content source.
//!
//! ### Transport
//! - Plain unauthenticated `GET`, gzip/brotli/deflate, rustls.
//! - Any status is returned to the caller; classifying success is the
//!   read-through fetcher's job.
//! - Max body bytes: 64MB (configurable).
//! - No timeout is imposed here; a hung request hangs the caller.
//!
//! ### Read-through
//! - [`ReadThroughFetcher`] consults the content store and the transport per
//!   [`Freshness`], deduplicating forced refreshes per process with a
//!   [`RefreshTracker`].

pub mod read_through;
pub mod refresh;

use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;

pub use read_through::{Freshness, NetworkOutcome, ReadThroughFetcher};
pub use refresh::RefreshTracker;

use gamedata_core::{AppConfig, Error, RawResponse};

/// Network seam of the fetcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a GET for `url`.
    ///
    /// Returns the response whatever its status; `Err` only for transport
    /// failures.
    async fn get(&self, url: &str) -> Result<RawResponse, Error>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "gamedata/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 64MB)
    pub max_bytes: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "gamedata/0.1".to_string(), max_bytes: 64 * 1024 * 1024 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_bytes: config.max_bytes }
    }
}

/// reqwest-backed [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    config: FetchConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Network(format!("{url}: {e}")))?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{url}: {len} bytes exceeds {}", self.config.max_bytes)));
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {url}: {e}")))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!(
                "{url}: {} bytes exceeds {}",
                body.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!(
            url,
            status = status.as_u16(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(RawResponse { status: status.as_u16(), headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "gamedata/0.1");
        assert_eq!(config.max_bytes, 64 * 1024 * 1024);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "editor/2.0".into(), max_bytes: 1024, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "editor/2.0");
        assert_eq!(config.max_bytes, 1024);
    }

    #[tokio::test]
    async fn test_http_transport_new() {
        let transport = HttpTransport::new(FetchConfig::default());
        assert!(transport.is_ok());
    }
}
