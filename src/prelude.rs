//! Prelude module for GRIB Fetcher Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use grib_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use grib_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = ModelRegistry::with_builtin();
//!     let client = Arc::new(GribClient::new(&ClientConfig::default())?);
//!     let config = FetchConfig::default().with_priority(["aws", "google"]);
//!
//!     let latest = find_latest(&registry, client, &config, "gfs", 6, None, 4).await?;
//!     let selection = latest.inventory_matching(":TMP:2 m above ground:").await?;
//!     println!("{} matching record(s)", selection.records().len());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Engine entry points
    find_latest,
    request_grid,
    ClientConfig,
    DownloadResult,
    FetchConfig,
    FetchProgress,
    ForecastBatch,
    ForecastFile,
    GribClient,
    // Models and templates
    ModelRegistry,
    ModelTemplate,
    Request,
    Requirement,
    // Inventory and selection
    Inventory,
    InventoryRecord,
    Selection,
    Source,
};

// Commonly used constants
pub use crate::constants::{DEFAULT_MAX_PARALLEL, DEFAULT_RATE_LIMIT_RPS, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        // Verify that all essential types are available through prelude
        let _client_config = ClientConfig::default();
        let _fetch_config = FetchConfig::default();
        let registry = ModelRegistry::with_builtin();

        assert!(registry.contains("hrrr"));
        assert_eq!(DEFAULT_MAX_PARALLEL, 8);
        assert!(USER_AGENT.contains("GRIB-Fetcher"));
    }

    #[test]
    fn test_std_reexports() {
        let _path = PathBuf::from("/tmp/test");
        let data = Arc::new(42);
        assert_eq!(*data, 42);
    }
}
