//! Configuration file support for the GRIB Fetcher command line
//!
//! The engine only ever sees explicit [`FetchConfig`] and [`ClientConfig`]
//! values. This module maps an optional TOML file onto them. Nothing is
//! created on disk: without a file, the built-in defaults apply.
//!
//! ```toml
//! [fetch]
//! save_dir = "/data/grib"
//! priority = ["aws", "google", "nomads"]
//! max_parallel = 8
//! retry_base_delay = "500ms"
//!
//! [client]
//! request_timeout = "2m"
//! rate_limit_rps = 5
//!
//! [logging]
//! level = "debug"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, FetchConfig};
use crate::constants::{config as config_files, http, limits, logging, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Application configuration as stored in TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Retrieval settings
    pub fetch: FetchConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfigToml {
    /// Artifact root; platform data directory when unset
    pub save_dir: Option<PathBuf>,
    /// Source names in preferred order
    pub priority: Option<Vec<String>>,
    pub max_parallel: usize,
    pub max_retries: u32,
    #[serde(with = "humantime_serde")]
    pub retry_base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_max_delay: Duration,
    pub overwrite: bool,
    pub keep_partial: bool,
    pub save_index: bool,
}

impl Default for FetchConfigToml {
    fn default() -> Self {
        Self {
            save_dir: None,
            priority: None,
            max_parallel: workers::DEFAULT_MAX_PARALLEL,
            max_retries: limits::MAX_RETRIES,
            retry_base_delay: Duration::from_millis(limits::RETRY_BASE_DELAY_MS),
            retry_max_delay: Duration::from_secs(limits::MAX_BACKOFF_SECS),
            overwrite: false,
            keep_partial: false,
            save_index: false,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Enable HTTP/2 support
    pub http2: bool,
    /// TCP keep-alive interval (None = disabled)
    #[serde(with = "humantime_serde")]
    pub tcp_keepalive: Option<Duration>,
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout (None = no timeout)
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    pub pool_max_per_host: usize,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    /// Requests per second, per source
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
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

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise the first of
    /// `./grib-fetcher.toml` and `<config dir>/grib-fetcher/config.toml`
    /// is used, falling back to defaults.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        let config = match path {
            Some(path) => Self::load_from_file(&path).await?,
            None => {
                debug!("No config file found; using defaults");
                Self::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Standard locations, most specific first
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(format!("./{}", config_files::LOCAL_CONFIG_FILE))];
        if let Some(dir) = dirs::config_dir() {
            paths.push(
                dir.join(config_files::CONFIG_DIR_NAME)
                    .join(config_files::CONFIG_FILE_NAME),
            );
        }
        paths
    }

    fn find_config_file() -> Option<PathBuf> {
        Self::search_paths().into_iter().find(|path| {
            let found = path.exists();
            if found {
                debug!("Found config file: {}", path.display());
            }
            found
        })
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Check every section, reporting all problems at once
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        if let Err(e) = self.fetch.to_runtime_config().validate() {
            errors.push(e.to_string());
        }
        errors.extend(self.client.to_runtime_config().problems());
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }

    /// Convert TOML-friendly configuration to runtime configuration
    pub fn to_runtime_config(&self) -> (FetchConfig, ClientConfig) {
        (
            self.fetch.to_runtime_config(),
            self.client.to_runtime_config(),
        )
    }
}

impl FetchConfigToml {
    /// Convert to runtime FetchConfig
    pub fn to_runtime_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            save_dir: self.save_dir.clone().unwrap_or(defaults.save_dir),
            priority: self.priority.clone(),
            max_parallel: self.max_parallel,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            retry_max_delay: self.retry_max_delay,
            overwrite: self.overwrite,
            keep_partial: self.keep_partial,
            save_index: self.save_index,
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            http2: self.http2,
            tcp_keepalive: self.tcp_keepalive,
            tcp_nodelay: self.tcp_nodelay,
            pool_idle_timeout: self.pool_idle_timeout,
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            probe_timeout: self.probe_timeout,
            rate_limit_rps: self.rate_limit_rps,
        }
    }
}
