//! ECMWF open data template
//!
//! IFS open data ships one JSON-lines `.index` per GRIB2 file.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, Timelike};

use super::ModelTemplate;
use crate::app::inventory::IndexGrammar;
use crate::app::models::{Request, SourceCandidate};

/// ECMWF Integrated Forecasting System open data
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ifs;

fn cutover(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, 0, 0))
        .unwrap_or_default()
}

impl Ifs {
    /// Grid resolution directory; 0.4 degree output was a beta
    fn resolution(reference_time: NaiveDateTime) -> &'static str {
        if reference_time < cutover(2024, 2, 1, 0) {
            "0p4-beta"
        } else {
            "0p25"
        }
    }

    /// Off-synoptic runs (06z and 18z) publish under a different stream
    fn stream(product: &str, hour: u32) -> &str {
        match (product, hour) {
            ("oper", 6 | 18) => "scda",
            ("wave", 6 | 18) => "scwv",
            _ => product,
        }
    }

    /// File type marker: `ef` for ensemble streams, `fc` otherwise
    fn file_type(stream: &str) -> &'static str {
        match stream {
            "enfo" | "waef" => "ef",
            _ => "fc",
        }
    }
}

impl ModelTemplate for Ifs {
    fn name(&self) -> &str {
        "ifs"
    }

    fn description(&self) -> &str {
        "ECMWF Integrated Forecasting System open data"
    }

    fn details(&self) -> &[(&str, &str)] {
        &[(
            "ECMWF open data",
            "https://confluence.ecmwf.int/display/DAC/ECMWF+open+data%3A+real-time+forecasts+from+IFS+and+AIFS",
        )]
    }

    fn products(&self) -> &[(&str, &str)] {
        &[
            ("oper", "high-resolution forecast, atmospheric fields"),
            ("enfo", "ensemble forecast, atmospheric fields"),
            ("wave", "wave model forecast"),
            ("waef", "ensemble wave model forecast"),
            ("scda", "short cutoff high-resolution forecast, atmospheric fields"),
            ("scwv", "short cutoff high-resolution forecast, wave fields"),
        ]
    }

    fn sources(&self, request: &Request, product: &str) -> Vec<SourceCandidate> {
        let time = request.reference_time();
        let stream = Self::stream(product, time.hour());
        let ifs_dir = if time < cutover(2024, 2, 28, 6) {
            ""
        } else {
            "ifs/"
        };
        let post_root = format!(
            "{}/{}{}/{}/{}-{}h-{}-{}.grib2",
            time.format("%Y%m%d/%Hz"),
            ifs_dir,
            Self::resolution(time),
            stream,
            time.format("%Y%m%d%H%M%S"),
            request.fxx(),
            stream,
            Self::file_type(stream)
        );

        vec![
            SourceCandidate::new(
                "aws",
                format!("https://ecmwf-forecasts.s3.eu-central-1.amazonaws.com/{post_root}"),
            ),
            SourceCandidate::new("ecmwf", format!("https://data.ecmwf.int/forecasts/{post_root}")),
        ]
    }

    fn index_suffixes(&self) -> &[&str] {
        &[".index"]
    }

    fn index_grammar(&self) -> IndexGrammar {
        IndexGrammar::Eccodes
    }

    fn cycle_interval(&self) -> ChronoDuration {
        ChronoDuration::hours(6)
    }
}
