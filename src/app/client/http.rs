//! Core HTTP operations with per-source rate limiting and retry logic
//!
//! Every request waits on a token bucket keyed by source name before it is
//! sent, so a slow or strict archive never throttles requests to another.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultKeyedRateLimiter, Jitter, Quota, RateLimiter};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;
use url::Url;

use super::retry::RetryPolicy;
use crate::app::inventory::ByteRange;
use crate::constants::limits;
use crate::errors::{ConfigError, ConfigResult, FetchError, FetchResult};

/// Result of a metadata-only existence probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Resource exists; size when the server reported one
    Found { content_length: Option<u64> },
    /// Server answered that the resource does not exist
    Missing,
}

impl Presence {
    pub fn is_found(&self) -> bool {
        matches!(self, Presence::Found { .. })
    }
}

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DefaultKeyedRateLimiter<String>,
    probe_timeout: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and per-source rate limit
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32, probe_timeout: Duration) -> ConfigResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            probe_timeout,
        })
    }

    /// Builds the keyed rate limiter with the specified rate limit
    fn build_rate_limiter(rate_limit_rps: u32) -> ConfigResult<DefaultKeyedRateLimiter<String>> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| ConfigError::InvalidValue {
            field: "rate_limit_rps".to_string(),
            value: rate_limit_rps.to_string(),
            reason: "Rate limit must be non-zero".to_string(),
        })?;
        Ok(RateLimiter::keyed(Quota::per_second(rps)))
    }

    /// Wait for the source's request budget, with jitter to avoid bursts
    async fn throttle(&self, source: &str) {
        self.rate_limiter
            .until_key_ready_with_jitter(
                &source.to_string(),
                Jitter::up_to(Duration::from_millis(limits::RATE_LIMIT_JITTER_MS)),
            )
            .await;
    }

    /// Check whether a resource exists with a HEAD request
    ///
    /// Client errors other than 429 mean the resource is absent. Transient
    /// failures are retried according to `retry`.
    pub async fn probe(&self, source: &str, url: &Url, retry: &RetryPolicy) -> FetchResult<Presence> {
        retry
            .run(&format!("HEAD {}", url), || self.probe_once(source, url))
            .await
    }

    async fn probe_once(&self, source: &str, url: &Url) -> FetchResult<Presence> {
        self.throttle(source).await;
        let response = self
            .client
            .head(url.as_str())
            .timeout(self.probe_timeout)
            .send()
            .await?;

        let status = response.status();
        debug!("Probe {} -> {}", url, status);
        if status.is_success() {
            return Ok(Presence::Found {
                content_length: header_content_length(&response),
            });
        }
        match classify_status(status, url) {
            FetchError::NotFound { .. } => Ok(Presence::Missing),
            FetchError::ServerError { status, .. } if status < 500 => Ok(Presence::Missing),
            other => Err(other),
        }
    }

    /// Fetch a small text resource such as an index file
    pub async fn get_text(&self, source: &str, url: &Url, retry: &RetryPolicy) -> FetchResult<String> {
        retry
            .run(&format!("GET {}", url), || self.get_text_once(source, url))
            .await
    }

    async fn get_text_once(&self, source: &str, url: &Url) -> FetchResult<String> {
        self.throttle(source).await;
        let response = self.client.get(url.as_str()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, url));
        }
        let text = response.text().await?;
        debug!("Fetched {} bytes of text from {}", text.len(), url);
        Ok(text)
    }

    /// Issue one range request and validate the response headers
    ///
    /// The body is left for the caller to stream. No retry happens here;
    /// callers retry the request and body read together.
    pub async fn get_range(&self, source: &str, url: &Url, range: &ByteRange) -> FetchResult<Response> {
        self.throttle(source).await;
        let header = range.to_header();
        let response = self
            .client
            .get(url.as_str())
            .header(RANGE, &header)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::PARTIAL_CONTENT => {
                let content_range = response
                    .headers()
                    .get(CONTENT_RANGE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("<missing>");
                if !content_range_matches(content_range, range) {
                    return Err(FetchError::ContentRangeMismatch {
                        expected: header,
                        actual: content_range.to_string(),
                    });
                }
                Ok(response)
            }
            // A server may ignore `bytes=0-` and send the whole file.
            StatusCode::OK if range.start == 0 && range.is_open() => Ok(response),
            StatusCode::OK | StatusCode::RANGE_NOT_SATISFIABLE => Err(FetchError::RangeNotHonoured {
                range: header,
                status: status.as_u16(),
            }),
            _ => Err(classify_status(status, url)),
        }
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Map a non-success status to the error taxonomy
fn classify_status(status: StatusCode, url: &Url) -> FetchError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::NotFound {
            url: url.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimitExceeded,
        StatusCode::SERVICE_UNAVAILABLE => FetchError::ServerOverloaded,
        other => FetchError::ServerError {
            status: other.as_u16(),
            url: url.to_string(),
        },
    }
}

/// Content-Length header value; HEAD responses carry no body to measure
fn header_content_length(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Check a `bytes start-end/total` header against the requested range
///
/// Open-ended requests only need a matching start.
pub(crate) fn content_range_matches(content_range: &str, requested: &ByteRange) -> bool {
    let Some(span) = content_range.trim().strip_prefix("bytes ") else {
        return false;
    };
    let Some((span, _total)) = span.split_once('/') else {
        return false;
    };
    let Some((start, end)) = span.split_once('-') else {
        return false;
    };
    let (Ok(start), Ok(end)) = (start.trim().parse::<u64>(), end.trim().parse::<u64>()) else {
        return false;
    };

    match requested.end {
        Some(expected_end) => start == requested.start && end == expected_end,
        None => start == requested.start && end >= start,
    }
}
