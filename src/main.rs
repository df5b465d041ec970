//! GRIB Fetcher CLI application
//!
//! Command-line interface for locating GRIB2 forecast files across public
//! archives and downloading whole files or message subsets.

use std::process;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use grib_fetcher::cli::{
    handle_batch, handle_download, handle_inventory, handle_latest, handle_models, Cli, Commands,
    Session,
};
use grib_fetcher::config::AppConfig;
use grib_fetcher::constants::logging;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let config = AppConfig::load(cli.global.config.clone())
        .await
        .context("Failed to load configuration")?;

    init_logging(&cli, &config.logging.level)?;
    info!("GRIB Fetcher v{} starting", env!("CARGO_PKG_VERSION"));

    let session = Session::new(&config, &cli.global).context("Failed to initialise HTTP client")?;

    match cli.command {
        Commands::Download(args) => {
            info!("Executing download command");
            handle_download(&session, args).await?
        }
        Commands::Inventory(args) => {
            info!("Executing inventory command");
            handle_inventory(&session, args).await?
        }
        Commands::Models(args) => handle_models(&session, args).await?,
        Commands::Latest(args) => {
            info!("Executing latest command");
            handle_latest(&session, args).await?
        }
        Commands::Batch(args) => {
            info!("Executing batch command");
            handle_batch(&session, args).await?
        }
    }
    Ok(())
}

/// Initialize logging from the verbosity flags, falling back to the configured level
fn init_logging(cli: &Cli, configured_level: &str) -> anyhow::Result<()> {
    let log_level = cli.log_level(configured_level);

    let directive: Directive = format!("{}={}", logging::LOG_TARGET, log_level)
        .parse()
        .with_context(|| format!("Invalid log level '{}'", log_level))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
    Ok(())
}
