//! Tuning for the shared archive client
//!
//! One `reqwest::Client` serves every source a retrieval touches, so its
//! pool and timeouts are sized for many small concurrent range requests
//! against a handful of hosts.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::{http, limits};
use crate::errors::{FetchError, FetchResult};

/// Connection, timeout and request-budget settings for [`GribClient`](super::GribClient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Negotiate HTTP/2 with an adaptive flow-control window
    pub http2: bool,
    pub tcp_keepalive: Option<Duration>,
    pub tcp_nodelay: bool,
    /// How long an idle pooled connection is kept
    pub pool_idle_timeout: Option<Duration>,
    /// Idle connections kept per archive host
    pub pool_max_per_host: usize,
    /// Bound on one request including its body
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Bound on a HEAD existence probe
    pub probe_timeout: Duration,
    /// Token-bucket refill per source name, in requests per second
    pub rate_limit_rps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            http2: false,
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            probe_timeout: http::PROBE_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

impl ClientConfig {
    pub fn with_rate_limit(mut self, rate_limit_rps: u32) -> Self {
        self.rate_limit_rps = rate_limit_rps;
        self
    }

    pub fn with_timeouts(mut self, request: Duration, probe: Duration) -> Self {
        self.request_timeout = request;
        self.probe_timeout = probe;
        self
    }

    /// Problems that would make the client unusable, one message each
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.rate_limit_rps == 0 {
            problems.push("client.rate_limit_rps must be non-zero".to_string());
        }
        if self.request_timeout.is_zero() {
            problems.push("client.request_timeout must be non-zero".to_string());
        }
        if self.probe_timeout.is_zero() {
            problems.push("client.probe_timeout must be non-zero".to_string());
        }
        problems
    }

    /// Build the pooled HTTP client
    ///
    /// `request_timeout` bounds each request separately; a slow range never
    /// holds up the others.
    pub fn build_http_client(&self) -> FetchResult<Client> {
        let mut builder = Client::builder()
            .user_agent(http::USER_AGENT)
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(http::MAX_REDIRECTS))
            .tcp_nodelay(self.tcp_nodelay)
            .pool_max_idle_per_host(self.pool_max_per_host)
            .pool_idle_timeout(self.pool_idle_timeout);

        if let Some(keepalive) = self.tcp_keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        if self.http2 {
            builder = builder
                .http2_adaptive_window(true)
                .http2_keep_alive_interval(Some(http::HTTP2_KEEP_ALIVE_INTERVAL))
                .http2_keep_alive_timeout(http::HTTP2_KEEP_ALIVE_TIMEOUT);
        }

        builder.build().map_err(FetchError::Http)
    }
}
