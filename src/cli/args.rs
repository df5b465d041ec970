//! Command-line argument parsing for GRIB Fetcher
//!
//! This module defines the CLI structure using clap derive macros: model
//! discovery, index inspection, latest-run lookup and (subset) downloads.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};

use crate::app::{request_grid, Request};
use crate::constants::{cycles, workers};
use crate::errors::ResolveResult;

/// GRIB Fetcher - Download whole or partial GRIB2 forecast files
#[derive(Parser, Debug)]
#[command(
    name = "grib_fetcher",
    version,
    about = "Find, index and subset GRIB2 forecast files from public archives",
    long_about = "Locates model output across several public archives (AWS, Google, NOMADS, ...),
parses the companion index files and downloads only the GRIB2 messages that match a
search pattern, using concurrent HTTP range requests."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Root directory for downloaded files
    #[arg(long, global = true, value_name = "DIR")]
    pub save_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download a whole file or the messages matching a search pattern
    Download(DownloadArgs),

    /// Show the parsed index of a file
    Inventory(InventoryArgs),

    /// List registered models and their products
    Models(ModelsArgs),

    /// Find the most recent available run
    Latest(LatestArgs),

    /// Inventory or download many runs and lead times at once
    Batch(BatchArgs),
}

/// Identifies one forecast file
#[derive(Args, Debug, Clone)]
pub struct RequestArgs {
    /// Model identifier (e.g. hrrr, gfs, ifs)
    #[arg(short, long, default_value = "hrrr")]
    pub model: String,

    /// Reference (initialization) time in UTC: "2024-03-01 06:00", "2024030106" or "2024-03-01"
    #[arg(short, long, value_parser = parse_reference_time)]
    pub date: NaiveDateTime,

    /// Forecast lead time in hours
    #[arg(short, long, default_value = "0")]
    pub fxx: u32,

    /// Product identifier; the model's default when omitted
    #[arg(short, long)]
    pub product: Option<String>,

    /// Ensemble member
    #[arg(long)]
    pub member: Option<u32>,

    /// Source priority, comma separated (e.g. aws,google)
    #[arg(long, value_delimiter = ',')]
    pub priority: Option<Vec<String>>,
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Regular expression matched against index search fields (e.g. ":TMP:2 m")
    #[arg(short, long)]
    pub search: Option<String>,

    /// Maximum concurrent range requests
    #[arg(short = 'j', long)]
    pub max_parallel: Option<usize>,

    /// Replace existing files and ignore local copies
    #[arg(long)]
    pub overwrite: bool,

    /// Keep incomplete output as .partial
    #[arg(long)]
    pub keep_partial: bool,

    /// Save the remote index next to the file
    #[arg(long)]
    pub save_index: bool,

    /// Download the whole file when no index is available
    #[arg(long)]
    pub full_file_fallback: bool,
}

/// Arguments for the inventory command
#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Only show records matching this pattern
    #[arg(short, long)]
    pub search: Option<String>,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the models command
#[derive(Args, Debug, Clone)]
pub struct ModelsArgs {
    /// Show details for one model
    pub model: Option<String>,
}

/// Arguments for the latest command
#[derive(Args, Debug, Clone)]
pub struct LatestArgs {
    /// Model identifier
    #[arg(short, long, default_value = "hrrr")]
    pub model: String,

    /// Forecast lead time in hours
    #[arg(short, long, default_value = "0")]
    pub fxx: u32,

    /// Product identifier
    #[arg(short, long)]
    pub product: Option<String>,

    /// Number of cycles to look back
    #[arg(long, default_value_t = cycles::DEFAULT_LATEST_PERIODS)]
    pub periods: u32,

    /// Source priority, comma separated
    #[arg(long, value_delimiter = ',')]
    pub priority: Option<Vec<String>>,

    /// Download the run that was found
    #[arg(long)]
    pub download: bool,

    /// Download only the matching messages (implies --download)
    #[arg(short, long)]
    pub search: Option<String>,
}

/// Arguments for the batch command
#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    /// Model identifier
    #[arg(short, long, default_value = "hrrr")]
    pub model: String,

    /// Reference times; repeat the flag or separate with commas
    #[arg(short, long = "date", required = true, value_delimiter = ',', value_parser = parse_reference_time)]
    pub dates: Vec<NaiveDateTime>,

    /// Lead times in hours; repeat the flag or separate with commas
    #[arg(short, long, value_delimiter = ',', default_value = "0")]
    pub fxx: Vec<u32>,

    /// Product identifier
    #[arg(short, long)]
    pub product: Option<String>,

    /// Ensemble member
    #[arg(long)]
    pub member: Option<u32>,

    /// Source priority, comma separated
    #[arg(long, value_delimiter = ',')]
    pub priority: Option<Vec<String>>,

    /// Regular expression matched against index search fields
    #[arg(short, long)]
    pub search: Option<String>,

    /// List matching index records instead of downloading
    #[arg(long)]
    pub inventory: bool,

    /// Files processed at once
    #[arg(long, default_value_t = workers::DEFAULT_BATCH_FILES)]
    pub max_files: usize,

    /// Replace existing files and ignore local copies
    #[arg(long)]
    pub overwrite: bool,
}

/// Parse a UTC reference time in one of the accepted layouts
pub fn parse_reference_time(value: &str) -> Result<NaiveDateTime, String> {
    let value = value.trim();
    for layout in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y%m%d%H%M"] {
        if let Ok(time) = NaiveDateTime::parse_from_str(value, layout) {
            return Ok(time);
        }
    }
    if value.len() == 10 && value.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(time) = NaiveDateTime::parse_from_str(&format!("{}00", value), "%Y%m%d%H%M") {
            return Ok(time);
        }
    }
    for layout in ["%Y-%m-%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, layout) {
            if let Some(time) = date.and_hms_opt(0, 0, 0) {
                return Ok(time);
            }
        }
    }
    Err(format!(
        "unrecognised date {:?}; use \"YYYY-MM-DD HH:MM\", YYYYMMDDHH or YYYY-MM-DD",
        value
    ))
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Log level directive from the verbosity flags, or `configured` without flags
    pub fn log_level(&self, configured: &str) -> String {
        if self.global.quiet {
            "error".to_string()
        } else if self.global.very_verbose {
            "debug".to_string()
        } else if self.global.verbose {
            "info".to_string()
        } else {
            configured.to_string()
        }
    }
}

impl RequestArgs {
    /// Build the engine request
    pub fn to_request(&self) -> ResolveResult<Request> {
        let mut request = Request::new(&self.model, self.date, self.fxx)?;
        if let Some(product) = &self.product {
            request = request.with_product(product.as_str());
        }
        if let Some(member) = self.member {
            request = request.with_member(member);
        }
        Ok(request)
    }
}

impl BatchArgs {
    /// Every date crossed with every lead time
    pub fn to_requests(&self) -> crate::errors::Result<Vec<Request>> {
        request_grid(
            &self.model,
            &self.dates,
            &self.fxx,
            self.product.as_deref(),
            self.member,
        )
    }
}

impl DownloadArgs {
    /// Check argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if self.max_parallel == Some(0) {
            return Err("--max-parallel must be greater than 0".to_string());
        }
        if let Some(search) = &self.search {
            if search.is_empty() {
                return Err("--search must not be empty; omit it to download the whole file".to_string());
            }
        }
        Ok(())
    }
}
