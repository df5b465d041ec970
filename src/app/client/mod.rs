//! HTTP client for remote forecast archives
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: probes, text downloads and range requests with per-source rate limiting
//! - `retry`: bounded exponential backoff shared by every stage

use reqwest::Response;
use url::Url;

use crate::app::inventory::ByteRange;
use crate::errors::{FetchResult, Result};

pub mod config;
pub mod http;
pub mod retry;

pub use config::ClientConfig;
pub use http::Presence;
pub use retry::RetryPolicy;

use http::HttpHandler;

/// Shared HTTP client for every archive a retrieval touches
///
/// Cheap to share behind an `Arc`; all state is internally synchronized.
#[derive(Debug)]
pub struct GribClient {
    http_handler: HttpHandler,
}

impl GribClient {
    /// Creates a client; retry behaviour is chosen per call
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the rate limit is zero
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, config.rate_limit_rps, config.probe_timeout)?;

        tracing::debug!(
            "Created HTTP client ({} requests/s per source)",
            config.rate_limit_rps
        );

        Ok(Self { http_handler })
    }

    /// Metadata-only existence probe, transient failures retried per `retry`
    pub async fn probe(&self, source: &str, url: &Url, retry: &RetryPolicy) -> FetchResult<Presence> {
        self.http_handler.probe(source, url, retry).await
    }

    /// Download a text resource, transient failures retried per `retry`
    pub async fn get_text(&self, source: &str, url: &Url, retry: &RetryPolicy) -> FetchResult<String> {
        self.http_handler.get_text(source, url, retry).await
    }

    /// Single range request; the caller streams and retries
    pub async fn get_range(&self, source: &str, url: &Url, range: &ByteRange) -> FetchResult<Response> {
        self.http_handler.get_range(source, url, range).await
    }
}
