//! Retrieval configuration passed explicitly into the engine

use std::path::PathBuf;
use std::time::Duration;

use crate::app::client::RetryPolicy;
use crate::constants::{files, limits, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Settings every retrieval entry point takes
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Root directory for local artifacts
    pub save_dir: PathBuf,
    /// Source names to try, in order; `None` keeps the template order
    pub priority: Option<Vec<String>>,
    /// Maximum concurrent range requests per download
    pub max_parallel: usize,
    /// Retries per request or group after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub retry_base_delay: Duration,
    /// Backoff cap
    pub retry_max_delay: Duration,
    /// Replace existing local artifacts and ignore local copies during resolution
    pub overwrite: bool,
    /// Keep failed output as `.partial` instead of removing it
    pub keep_partial: bool,
    /// Save fetched remote index files next to the full artifact
    pub save_index: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
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

/// Platform data directory, falling back to `./data`
pub fn default_save_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(files::DEFAULT_DATA_DIR))
        .unwrap_or_else(|| PathBuf::from("data"))
}

impl FetchConfig {
    pub fn with_save_dir(mut self, save_dir: impl Into<PathBuf>) -> Self {
        self.save_dir = save_dir.into();
        self
    }

    /// Restrict and reorder sources, e.g. `["google", "aws"]`
    pub fn with_priority<I, S>(mut self, priority: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.priority = Some(priority.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay = base_delay;
        self.retry_max_delay = max_delay;
        self
    }

    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_parallel == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_parallel".to_string(),
                value: "0".to_string(),
                reason: "At least one parallel fetch is required".to_string(),
            });
        }

        if self.max_parallel > workers::MAX_PARALLEL {
            return Err(ConfigError::InvalidValue {
                field: "max_parallel".to_string(),
                value: self.max_parallel.to_string(),
                reason: format!("Must not exceed {}", workers::MAX_PARALLEL),
            });
        }

        if self.retry_base_delay > self.retry_max_delay {
            return Err(ConfigError::InvalidValue {
                field: "retry_base_delay".to_string(),
                value: format!("{:?}", self.retry_base_delay),
                reason: "Retry base delay must not exceed the max delay".to_string(),
            });
        }

        if let Some(priority) = &self.priority {
            if priority.is_empty() || priority.iter().any(|name| name.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    field: "priority".to_string(),
                    value: format!("{:?}", priority),
                    reason: "Source priority must list at least one non-empty name".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Backoff schedule shared by probes, index downloads and range groups
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_delay, self.retry_max_delay)
    }
}
