//! Application constants for GRIB Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "GRIB-Fetcher/0.1.0 (Forecast Subsetting Tool)";

    /// Default per-request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Timeout for metadata-only existence probes
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(20);

    /// HTTP/2 keep-alive interval
    pub const HTTP2_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

    /// HTTP/2 keep-alive timeout
    pub const HTTP2_KEEP_ALIVE_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 25;

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default per-source request budget (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;

    /// Maximum retry attempts for failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    /// Maximum backoff delay (seconds)
    pub const MAX_BACKOFF_SECS: u64 = 30;

    /// Jitter factor for randomizing delays (0.0-1.0)
    pub const BACKOFF_JITTER_FACTOR: f64 = 0.1;

    /// Upper bound on jitter added by the rate limiter (milliseconds)
    pub const RATE_LIMIT_JITTER_MS: u64 = 50;
}

/// Remote archive conventions
pub mod sources {
    /// Name reserved for the already-downloaded local copy
    pub const LOCAL_SOURCE: &str = "local";

    /// Name of the NOAA operational server with short retention
    pub const NOMADS_SOURCE: &str = "nomads";

    /// Days NOMADS keeps model output before it ages off
    pub const NOMADS_RETENTION_DAYS: i64 = 14;

    /// Responses shorter than this are error pages, not GRIB payloads
    pub const MIN_CONTENT_LENGTH: u64 = 10;

    /// Primary file extensions replaced (rather than appended to) when deriving index URLs
    pub const GRIB_EXTENSIONS: &[&str] = &[".grib2", ".grb2", ".grib", ".grb"];

    /// Pattern that selects every record, i.e. a whole-file download
    pub const MATCH_ALL_PATTERN: &str = ":";
}

/// File operation constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Suffix marking an incomplete artifact
    pub const PARTIAL_FILE_SUFFIX: &str = ".partial";

    /// Prefix of subset artifact file names
    pub const SUBSET_PREFIX: &str = "subset_";

    /// Separator between subset fingerprint and the full file name
    pub const SUBSET_SEPARATOR: &str = "__";

    /// Directory name under the platform data dir when no save dir is configured
    pub const DEFAULT_DATA_DIR: &str = "grib-fetcher";
}

/// Worker and concurrency configuration
pub mod workers {
    /// Default number of concurrent range requests per download
    pub const DEFAULT_MAX_PARALLEL: usize = 8;

    /// Maximum recommended concurrent range requests
    pub const MAX_PARALLEL: usize = 64;

    /// Files a batch works on at once
    pub const DEFAULT_BATCH_FILES: usize = 4;

    /// Channel buffer size for progress events
    pub const PROGRESS_CHANNEL_SIZE: usize = 100;
}

/// Model run discovery
pub mod cycles {
    /// Number of cycles searched backwards by latest-run discovery
    pub const DEFAULT_LATEST_PERIODS: u32 = 4;
}

/// Configuration file discovery
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "grib-fetcher.toml";

    /// Directory under the platform config dir
    pub const CONFIG_DIR_NAME: &str = "grib-fetcher";

    /// File name inside the platform config dir
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";

    /// Crate target used in tracing filter directives
    pub const LOG_TARGET: &str = "grib_fetcher";
}

// Re-export commonly used constants for convenience
pub use files::{PARTIAL_FILE_SUFFIX, TEMP_FILE_SUFFIX};
pub use http::USER_AGENT;
pub use limits::{DEFAULT_RATE_LIMIT_RPS, MAX_RETRIES, RETRY_BASE_DELAY_MS};
pub use workers::DEFAULT_MAX_PARALLEL;
