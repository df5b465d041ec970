//! GRIB Fetcher Library
//!
//! A Rust library for locating, indexing and partially retrieving GRIB2
//! forecast files from multiple remote archives. Only the byte ranges of the
//! requested messages are downloaded, concurrently, and reassembled into a
//! smaller valid GRIB2 file.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        // Test that our constants are accessible
        assert_eq!(DEFAULT_MAX_PARALLEL, 8);
        assert!(USER_AGENT.contains("GRIB-Fetcher"));
        assert_eq!(PARTIAL_FILE_SUFFIX, ".partial");
    }

    #[test]
    fn test_error_types() {
        // Test that our error types work correctly
        let resolve_error = errors::ResolveError::IndexUnavailable {
            source_name: "aws".to_string(),
            primary: "https://example.com/a.grib2".to_string(),
        };
        let app_error = AppError::Resolve(resolve_error);

        assert_eq!(app_error.category(), "resolve");
        assert!(!app_error.is_recoverable());
        assert!(app_error.offers_full_file_fallback());
    }
}
