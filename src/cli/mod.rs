//! Command-line interface components
//!
//! This module contains CLI-specific code for the GRIB Fetcher application,
//! including argument parsing, progress display, and command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{
    parse_reference_time, BatchArgs, Cli, Commands, DownloadArgs, GlobalArgs, InventoryArgs,
    LatestArgs, ModelsArgs, RequestArgs,
};
pub use commands::{
    handle_batch, handle_download, handle_inventory, handle_latest, handle_models, Session,
};
pub use progress::{ProgressConfig, ProgressDisplay, ProgressSummary};
