//! Core retrieval engine for GRIB Fetcher
//!
//! This module contains the discovery-and-subset pipeline: model templates,
//! source resolution, index parsing, record selection and concurrent
//! byte-range retrieval.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use chrono::NaiveDate;
//! use grib_fetcher::app::{ClientConfig, FetchConfig, ForecastFile, GribClient, ModelRegistry, Request};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModelRegistry::with_builtin();
//! let client = Arc::new(GribClient::new(&ClientConfig::default())?);
//!
//! let run = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_hms_opt(6, 0, 0).unwrap();
//! let request = Request::new("hrrr", run, 3)?.with_product("sfc");
//! let file = ForecastFile::new(&registry, request, client, FetchConfig::default())?;
//!
//! // Only the 2 m temperature and 10 m wind messages are fetched.
//! let result = file.download(Some(":(TMP:2 m|[UV]GRD:10 m)")).await?;
//! println!("{} bytes -> {}", result.bytes_written, result.path.display());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod batch;
pub mod catalog;
pub mod client;
pub mod fetcher;
pub mod forecast;
pub mod inventory;
pub mod latest;
pub mod models;
pub mod resolver;
pub mod subset;

// Re-export main public API
pub use batch::{request_grid, BatchItem, ForecastBatch};
pub use catalog::{ModelRegistry, ModelTemplate};
pub use client::{ClientConfig, GribClient, RetryPolicy};
pub use fetcher::{DownloadResult, FetchConfig, FetchProgress, GroupOutcome, RangeFetcher};
pub use forecast::ForecastFile;
pub use inventory::{ByteRange, IndexGrammar, Inventory, InventoryRecord};
pub use latest::find_latest;
pub use models::{Location, Request, Requirement, Source, SourceCandidate};
pub use resolver::SourceResolver;
pub use subset::{Selection, SubsetGroup};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        // Ensure public API is accessible
        let config = ClientConfig::default();
        assert!(config.tcp_nodelay);
        assert!(ModelRegistry::with_builtin().contains("gfs"));
        assert!(FetchConfig::default().validate().is_ok());
    }
}
