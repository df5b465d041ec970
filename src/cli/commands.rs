//! Command handlers for the GRIB Fetcher CLI
//!
//! Each handler maps parsed arguments onto engine calls. Engine settings
//! come from the configuration file, overridden by global and per-command
//! flags, and are passed explicitly into every call.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::app::{
    find_latest, DownloadResult, FetchConfig, ForecastBatch, ForecastFile, GribClient,
    InventoryRecord, ModelRegistry, Requirement,
};
use crate::cli::{
    BatchArgs, DownloadArgs, GlobalArgs, InventoryArgs, LatestArgs, ModelsArgs, ProgressConfig,
    ProgressDisplay,
};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Shared state for one CLI invocation
pub struct Session {
    pub registry: ModelRegistry,
    pub client: Arc<GribClient>,
    pub fetch: FetchConfig,
    pub quiet: bool,
}

impl Session {
    /// Build the registry, HTTP client and base retrieval settings
    pub fn new(config: &AppConfig, global: &GlobalArgs) -> Result<Self> {
        let (mut fetch, client_config) = config.to_runtime_config();
        if let Some(save_dir) = &global.save_dir {
            fetch.save_dir = save_dir.clone();
        }
        let client = GribClient::new(&client_config)?;
        debug!("Artifacts are saved under {}", fetch.save_dir.display());

        Ok(Self {
            registry: ModelRegistry::with_builtin(),
            client: Arc::new(client),
            fetch,
            quiet: global.quiet,
        })
    }

    /// Base settings with a per-command priority override
    fn fetch_config(&self, priority: Option<&Vec<String>>) -> FetchConfig {
        let mut fetch = self.fetch.clone();
        if let Some(priority) = priority {
            fetch.priority = Some(priority.clone());
        }
        fetch
    }
}

/// Handle the download command
pub async fn handle_download(session: &Session, args: DownloadArgs) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;

    let mut fetch = session.fetch_config(args.request.priority.as_ref());
    if let Some(max_parallel) = args.max_parallel {
        fetch.max_parallel = max_parallel;
    }
    fetch.overwrite |= args.overwrite;
    fetch.keep_partial |= args.keep_partial;
    fetch.save_index |= args.save_index;

    let request = args.request.to_request()?;
    info!("Starting download of {}", request);
    let file = ForecastFile::new(&session.registry, request, Arc::clone(&session.client), fetch)?;

    let pattern = args.search.as_deref();
    let result = match download(session, &file, pattern).await {
        Err(e) if args.full_file_fallback && e.offers_full_file_fallback() => {
            warn!("{}; downloading the full file instead", e);
            download(session, &file, None).await?
        }
        other => other?,
    };

    print_download_summary(session, &result, start_time);
    Ok(())
}

/// Handle the inventory command
pub async fn handle_inventory(session: &Session, args: InventoryArgs) -> Result<()> {
    let fetch = session.fetch_config(args.request.priority.as_ref());
    let request = args.request.to_request()?;
    let file = ForecastFile::new(&session.registry, request, Arc::clone(&session.client), fetch)?;

    let records: Vec<InventoryRecord> = match args.search.as_deref() {
        Some(pattern) => file.inventory_matching(pattern).await?.records().to_vec(),
        None => file.inventory().await?.records().to_vec(),
    };
    let source = file.resolve(Requirement::Subset).await?;
    info!("Index from {}", source);

    if args.json {
        let json = serde_json::to_string_pretty(&records)
            .map_err(|e| AppError::generic(format!("Could not serialize inventory: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    for record in &records {
        println!(
            "{:>7}  {:>24}  {}",
            record.label(),
            record.range.to_string(),
            record.search
        );
    }
    if !session.quiet {
        println!();
        println!("{} record(s) from {}", records.len(), source.name);
    }
    Ok(())
}

/// Handle the models command
pub async fn handle_models(session: &Session, args: ModelsArgs) -> Result<()> {
    let Some(name) = args.model else {
        println!("Available models:");
        for (id, template) in session.registry.iter() {
            println!("  {:<10} {}", id, template.description());
        }
        return Ok(());
    };

    let template = session.registry.get(&name)?;
    println!("{}: {}", template.name(), template.description());
    println!();
    println!("Products:");
    for (index, (id, description)) in template.products().iter().enumerate() {
        let marker = if index == 0 { " (default)" } else { "" };
        println!("  {:<8} {}{}", id, description, marker);
    }
    println!();
    println!("Index suffixes: {}", template.index_suffixes().join(", "));
    println!(
        "Cycle interval: {}h",
        template.cycle_interval().num_hours()
    );
    if !template.details().is_empty() {
        println!();
        for (label, url) in template.details() {
            println!("  {}: {}", label, url);
        }
    }
    Ok(())
}

/// Handle the latest command
pub async fn handle_latest(session: &Session, args: LatestArgs) -> Result<()> {
    let start_time = Instant::now();
    let fetch = session.fetch_config(args.priority.as_ref());

    let file = find_latest(
        &session.registry,
        Arc::clone(&session.client),
        &fetch,
        &args.model,
        args.fxx,
        args.product.as_deref(),
        args.periods,
    )
    .await?;
    let source = file.resolve(Requirement::WholeFile).await?;
    println!("{} available from {}", file.request(), source.name);
    println!("  {}", source.primary);

    if args.download || args.search.is_some() {
        let result = download(session, &file, args.search.as_deref()).await?;
        print_download_summary(session, &result, start_time);
    }
    Ok(())
}

/// Handle the batch command
pub async fn handle_batch(session: &Session, args: BatchArgs) -> Result<()> {
    let start_time = Instant::now();
    if args.max_files == 0 {
        return Err(AppError::generic("--max-files must be greater than 0"));
    }
    if args.search.as_deref() == Some("") {
        return Err(AppError::generic("--search must not be empty"));
    }

    let mut fetch = session.fetch_config(args.priority.as_ref());
    fetch.overwrite |= args.overwrite;
    let requests = args.to_requests()?;
    let batch = ForecastBatch::new(&session.registry, requests, Arc::clone(&session.client), fetch)?
        .with_max_files(args.max_files);

    let pattern = args.search.as_deref();
    let (succeeded, total) = if args.inventory {
        let items = batch.inventory(pattern).await;
        for item in &items {
            let Ok(records) = &item.result else { continue };
            for record in records {
                println!(
                    "{}  F{:02}  {:>7}  {:>24}  {}",
                    item.request.reference_time().format("%Y-%m-%d %H:%M"),
                    item.request.fxx(),
                    record.label(),
                    record.range.to_string(),
                    record.search
                );
            }
        }
        (items.iter().filter(|item| item.succeeded()).count(), items.len())
    } else {
        let items = batch.download(pattern).await;
        for item in &items {
            match &item.result {
                Ok(result) if session.quiet => println!("{}", result.path.display()),
                Ok(result) => println!(
                    "{}  {} ({} bytes{})",
                    item.request,
                    result.path.display(),
                    result.bytes_written,
                    if result.reused { ", existing" } else { "" }
                ),
                Err(e) => eprintln!("{}  failed: {}", item.request, e),
            }
        }
        (items.iter().filter(|item| item.succeeded()).count(), items.len())
    };

    if !session.quiet {
        println!();
        println!(
            "{}/{} file(s) succeeded in {:.1?}",
            succeeded,
            total,
            start_time.elapsed()
        );
    }
    if succeeded < total {
        return Err(AppError::generic(format!(
            "{} of {} file(s) failed",
            total - succeeded,
            total
        )));
    }
    Ok(())
}

/// Run one download, with a progress display unless quiet
async fn download(
    session: &Session,
    file: &ForecastFile,
    pattern: Option<&str>,
) -> Result<DownloadResult> {
    if session.quiet {
        return file.download(pattern).await;
    }

    let (display, progress) = ProgressDisplay::spawn(ProgressConfig::default());
    let result = file.download_with_progress(pattern, progress).await;
    let summary = display.finish().await;
    debug!(
        "Progress: {}/{} groups, {} retries, {} failed",
        summary.completed, summary.groups, summary.retries, summary.failed
    );
    result
}

fn print_download_summary(session: &Session, result: &DownloadResult, start_time: Instant) {
    if session.quiet {
        println!("{}", result.path.display());
        return;
    }

    if result.reused {
        println!("Already downloaded: {}", result.path.display());
        return;
    }

    println!("Saved {}", result.path.display());
    println!("  Source:   {}", result.source);
    println!("  Size:     {} bytes", result.bytes_written);
    if !result.records.is_empty() {
        println!(
            "  Messages: {} in {} range request(s)",
            result.records.len(),
            result.groups.len()
        );
    }
    let retried = result.requests().saturating_sub(result.groups.len() as u32);
    if retried > 0 {
        println!("  Retries:  {}", retried);
    }
    println!("  Elapsed:  {:.1?}", start_time.elapsed());
}
