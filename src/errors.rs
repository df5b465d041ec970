//! Error types for GRIB Fetcher
//!
//! This module defines the error taxonomy for every stage of a retrieval:
//! source resolution, index parsing, byte-range fetching and configuration.
//! Resolution and index errors surface before any range request is issued;
//! fetch errors are aggregated after every scheduled group has settled.

use std::path::PathBuf;

use thiserror::Error;

/// Source resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Model identifier is not registered
    #[error("Unknown model '{model}'. Registered models: {available}")]
    UnknownModel { model: String, available: String },

    /// Product is not offered by the model template
    #[error("Unknown product '{product}' for model '{model}'. Available products: {available}")]
    UnknownProduct {
        model: String,
        product: String,
        available: String,
    },

    /// Source name is not part of the model template
    #[error("Unknown source '{source_name}' for model '{model}'")]
    UnknownSource { model: String, source_name: String },

    /// Request fields are inconsistent or impossible
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// No candidate source satisfied resolution
    #[error("No source hosts {request}. Tried: {}", tried.join(", "))]
    SourceExhausted { request: String, tried: Vec<String> },

    /// Primary file exists but no source offers an index for subsetting
    #[error(
        "Index file not found for {primary} (source: {source_name}). Retry without a search pattern to download the full file"
    )]
    IndexUnavailable { source_name: String, primary: String },
}

/// Index fetching and parsing errors
#[derive(Error, Debug)]
pub enum IndexError {
    /// Line-oriented index could not be parsed; offsets cannot be trusted
    #[error("Index file corrupt at line {line}: {reason} ({content:?})")]
    Corrupt {
        line: usize,
        content: String,
        reason: String,
    },

    /// Index contained no usable records
    #[error("Index file contains no records: {location}")]
    Empty { location: String },

    /// Index could not be downloaded
    #[error("Failed to fetch index file")]
    Fetch(#[from] FetchError),

    /// Local index could not be read or written
    #[error("Index file I/O error")]
    Io(#[from] std::io::Error),
}

/// Byte-range retrieval and artifact errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned error status
    #[error("Server error: HTTP {status} for {url}")]
    ServerError { status: u16, url: String },

    /// Remote resource does not exist
    #[error("Resource not found: {url}")]
    NotFound { url: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Server ignored or rejected the Range header
    #[error("Range request {range} not honoured: HTTP {status}")]
    RangeNotHonoured { range: String, status: u16 },

    /// Content-Range header does not describe the requested span
    #[error("Content-Range mismatch: requested {expected}, got {actual}")]
    ContentRangeMismatch { expected: String, actual: String },

    /// Connection delivered fewer bytes than requested
    #[error("Short read for {range}: expected {expected} bytes, received {received}")]
    ShortRead {
        range: String,
        expected: u64,
        received: u64,
    },

    /// Maximum retries exceeded
    #[error("Maximum retry attempts ({max_retries}) exceeded: {last_error}")]
    MaxRetriesExceeded { max_retries: u32, last_error: String },

    /// One or more subset groups exhausted their retry budget
    #[error("{failed} of {total} byte-range groups failed; incomplete output: {}", partial.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "removed".to_string()))]
    GroupFetchFailed {
        failed: usize,
        total: usize,
        partial: Option<PathBuf>,
    },

    /// Assembled artifact length disagrees with the selected byte spans
    #[error("Byte count mismatch. Expected: {expected} bytes, got: {actual} bytes")]
    ByteCountMismatch { expected: u64, actual: u64 },

    /// Search pattern matched no records
    #[error("Search pattern {pattern:?} matched no index records; nothing to download")]
    EmptySelection { pattern: String },

    /// Search pattern is not a valid regular expression
    #[error("Invalid search pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// I/O error during file operations
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Atomic file operation failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Background task panicked or was cancelled
    #[error("Fetch task for group {group} did not complete: {reason}")]
    TaskJoin { group: usize, reason: String },
}

impl FetchError {
    /// Whether a fresh attempt of the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            FetchError::ServerError { status, .. } => *status >= 500,
            FetchError::RateLimitExceeded
            | FetchError::ServerOverloaded
            | FetchError::ShortRead { .. } => true,
            _ => false,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<String> },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Resolution error
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Index error
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(e) => e.is_transient(),
            AppError::Index(IndexError::Fetch(e)) => e.is_transient(),
            _ => false,
        }
    }

    /// Whether the caller may fall back to a whole-file download
    pub fn offers_full_file_fallback(&self) -> bool {
        matches!(
            self,
            AppError::Resolve(ResolveError::IndexUnavailable { .. })
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Resolve(_) => "resolve",
            AppError::Index(_) => "index",
            AppError::Fetch(_) => "fetch",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Resolution result type alias
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Index result type alias
pub type IndexResult<T> = std::result::Result<T, IndexError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::RateLimitExceeded.is_transient());
        assert!(FetchError::ServerOverloaded.is_transient());
        assert!(FetchError::ServerError {
            status: 502,
            url: "https://example.com/a.grib2".to_string()
        }
        .is_transient());
        assert!(!FetchError::ServerError {
            status: 403,
            url: "https://example.com/a.grib2".to_string()
        }
        .is_transient());
        assert!(!FetchError::ByteCountMismatch {
            expected: 10,
            actual: 9
        }
        .is_transient());
    }

    #[test]
    fn test_error_categories() {
        let err = AppError::from(ResolveError::SourceExhausted {
            request: "hrrr".to_string(),
            tried: vec!["aws".to_string(), "nomads".to_string()],
        });
        assert_eq!(err.category(), "resolve");
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("aws, nomads"));

        let err = AppError::from(IndexError::Corrupt {
            line: 3,
            content: "garbage".to_string(),
            reason: "missing byte offset".to_string(),
        });
        assert_eq!(err.category(), "index");
    }

    #[test]
    fn test_index_unavailable_offers_fallback() {
        let err = AppError::from(ResolveError::IndexUnavailable {
            source_name: "aws".to_string(),
            primary: "https://example.com/a.grib2".to_string(),
        });
        assert!(err.offers_full_file_fallback());

        let err = AppError::from(FetchError::EmptySelection {
            pattern: ":NOPE:".to_string(),
        });
        assert!(!err.offers_full_file_fallback());
    }
}
