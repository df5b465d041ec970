//! Data models for forecast file requests and their resolved sources
//!
//! A [`Request`] names exactly one logical remote file: model, reference
//! (initialization) time, forecast lead, product and optional ensemble member.
//! Resolution turns the ordered [`SourceCandidate`] list a model template
//! produces into a concrete [`Source`].

use std::fmt;
use std::path::PathBuf;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{ResolveError, ResolveResult};

/// Immutable description of one logical forecast file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    model: String,
    reference_time: NaiveDateTime,
    fxx: u32,
    product: Option<String>,
    member: Option<u32>,
}

impl Request {
    /// Create a request for a model run and forecast lead (hours)
    ///
    /// Reference times are UTC. A reference time later than now is rejected.
    pub fn new(model: &str, reference_time: NaiveDateTime, fxx: u32) -> ResolveResult<Self> {
        let model = model.trim().to_lowercase();
        if model.is_empty() {
            return Err(ResolveError::InvalidRequest {
                reason: "model identifier must not be empty".to_string(),
            });
        }

        let now = Utc::now().naive_utc();
        if reference_time > now {
            return Err(ResolveError::InvalidRequest {
                reason: format!(
                    "reference time {} is in the future (now is {})",
                    reference_time.format("%Y-%m-%d %H:%M"),
                    now.format("%Y-%m-%d %H:%M")
                ),
            });
        }

        Ok(Self {
            model,
            reference_time,
            fxx,
            product: None,
            member: None,
        })
    }

    /// Create a request from the time the forecast is valid for
    ///
    /// The reference time is `valid_time - fxx`.
    pub fn from_valid_time(model: &str, valid_time: NaiveDateTime, fxx: u32) -> ResolveResult<Self> {
        let reference_time = valid_time - ChronoDuration::hours(i64::from(fxx));
        Self::new(model, reference_time, fxx)
    }

    /// Select a product; the template's default is used otherwise
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Select an ensemble member
    pub fn with_member(mut self, member: u32) -> Self {
        self.member = Some(member);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn reference_time(&self) -> NaiveDateTime {
        self.reference_time
    }

    /// Forecast lead time in hours
    pub fn fxx(&self) -> u32 {
        self.fxx
    }

    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    pub fn member(&self) -> Option<u32> {
        self.member
    }

    /// Time the forecast is valid for
    pub fn valid_time(&self) -> NaiveDateTime {
        self.reference_time + ChronoDuration::hours(i64::from(self.fxx))
    }

    /// Reference date as `YYYYMMDD`, the directory convention of every archive
    pub fn date_stamp(&self) -> String {
        self.reference_time.format("%Y%m%d").to_string()
    }

    /// Reference hour as two digits
    pub fn hour_stamp(&self) -> String {
        self.reference_time.format("%H").to_string()
    }

    /// Age of the reference time relative to now
    pub fn age(&self) -> ChronoDuration {
        Utc::now().naive_utc() - self.reference_time
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} F{:02}",
            self.model,
            self.reference_time.format("%Y-%m-%d %H:%M"),
            self.fxx
        )?;
        if let Some(product) = &self.product {
            write!(f, " [{}]", product)?;
        }
        if let Some(member) = self.member {
            write!(f, " member {}", member)?;
        }
        Ok(())
    }
}

/// Where a resource lives
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl Location {
    /// Parse a template-produced location; URLs with a scheme are remote
    pub fn parse(raw: &str) -> ResolveResult<Self> {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Url::parse(raw)
                .map(Location::Remote)
                .map_err(|e| ResolveError::InvalidRequest {
                    reason: format!("invalid source URL {}: {}", raw, e),
                })
        } else if let Some(path) = raw.strip_prefix("file://") {
            Ok(Location::Local(PathBuf::from(path)))
        } else {
            Ok(Location::Local(PathBuf::from(raw)))
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Location::Local(_))
    }

    /// Text form used for suffix manipulation and logging
    pub fn as_string(&self) -> String {
        match self {
            Location::Remote(url) => url.to_string(),
            Location::Local(path) => path.display().to_string(),
        }
    }

    /// Final path segment, used to name saved index copies
    pub fn file_name(&self) -> Option<String> {
        match self {
            Location::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            Location::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

/// One candidate source produced by a model template, before probing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    pub name: String,
    pub primary: String,
}

impl SourceCandidate {
    pub fn new(name: impl Into<String>, primary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary: primary.into(),
        }
    }
}

/// What resolution has to confirm before a source qualifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// The primary file alone is enough
    WholeFile,
    /// The primary file and its index must both exist
    Subset,
}

/// A source confirmed to host the requested file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    /// Archive name, e.g. `aws` or `nomads`
    pub name: String,
    /// Position in the effective priority order (lower is preferred)
    pub rank: usize,
    /// Primary file location
    pub primary: Location,
    /// Index location, when one was found
    pub index: Option<Location>,
    /// Primary size reported by the existence probe
    pub content_length: Option<u64>,
}

impl Source {
    pub fn is_local(&self) -> bool {
        self.primary.is_local()
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (rank {}): {}", self.name, self.rank, self.primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn run_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_request_fields_and_stamps() {
        let request = Request::new("HRRR", run_time(), 6)
            .unwrap()
            .with_product("sfc")
            .with_member(2);

        assert_eq!(request.model(), "hrrr");
        assert_eq!(request.fxx(), 6);
        assert_eq!(request.product(), Some("sfc"));
        assert_eq!(request.member(), Some(2));
        assert_eq!(request.date_stamp(), "20240301");
        assert_eq!(request.hour_stamp(), "06");
        assert_eq!(request.valid_time().format("%H").to_string(), "12");
        assert_eq!(request.to_string(), "hrrr 2024-03-01 06:00 F06 [sfc] member 2");
    }

    #[test]
    fn test_request_from_valid_time() {
        let valid = run_time() + ChronoDuration::hours(12);
        let request = Request::from_valid_time("gfs", valid, 12).unwrap();
        assert_eq!(request.reference_time(), run_time());
        assert_eq!(request.valid_time(), valid);
    }

    #[test]
    fn test_request_rejects_future_reference_time() {
        let future = Utc::now().naive_utc() + ChronoDuration::days(2);
        let result = Request::new("hrrr", future, 0);
        assert!(matches!(result, Err(ResolveError::InvalidRequest { .. })));
    }

    #[test]
    fn test_request_rejects_empty_model() {
        assert!(Request::new("  ", run_time(), 0).is_err());
    }

    #[test]
    fn test_location_parse() {
        let remote = Location::parse("https://example.com/hrrr/a.grib2").unwrap();
        assert!(!remote.is_local());
        assert_eq!(remote.file_name().as_deref(), Some("a.grib2"));

        let local = Location::parse("/data/hrrr/a.grib2").unwrap();
        assert!(local.is_local());
        assert_eq!(local.file_name().as_deref(), Some("a.grib2"));

        let file_url = Location::parse("file:///data/a.grib2").unwrap();
        assert_eq!(file_url, Location::Local(PathBuf::from("/data/a.grib2")));
    }
}
