//! Progress display for range retrievals
//!
//! Consumes [`FetchProgress`] events from a retrieval and renders them as an
//! indicatif progress bar, or as plain log lines when stdout is not a
//! terminal.
//!
//! # Examples
//!
//! ```rust,no_run
//! use grib_fetcher::cli::{ProgressConfig, ProgressDisplay};
//!
//! # async fn example(file: grib_fetcher::app::ForecastFile) -> grib_fetcher::Result<()> {
//! let (display, sender) = ProgressDisplay::spawn(ProgressConfig::default());
//! let result = file.download_with_progress(Some(":TMP:"), sender).await;
//! let summary = display.finish().await;
//! println!("{} groups completed", summary.completed);
//! # result.map(|_| ())
//! # }
//! ```

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::FetchProgress;
use crate::constants::workers;

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Draw a progress bar; falls back to text when stdout is not a terminal
    pub enable_progress_bars: bool,
    /// Spinner tick interval
    pub update_interval: Duration,
    /// Print each retry as it happens
    pub show_retries: bool,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            update_interval: Duration::from_millis(100),
            show_retries: true,
        }
    }
}

impl ProgressConfig {
    /// No bar, only log lines
    pub fn text_only() -> Self {
        Self {
            enable_progress_bars: false,
            ..Default::default()
        }
    }
}

/// Counters collected while events are rendered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub groups: usize,
    pub completed: usize,
    pub failed: usize,
    pub retries: usize,
    pub bytes: u64,
    pub elapsed: Duration,
}

/// Renders events from one retrieval until its sender is dropped
pub struct ProgressDisplay {
    handle: JoinHandle<ProgressSummary>,
}

impl ProgressDisplay {
    /// Start the display task and return the sender to hand to the retrieval
    pub fn spawn(config: ProgressConfig) -> (Self, mpsc::Sender<FetchProgress>) {
        let (tx, rx) = mpsc::channel(workers::PROGRESS_CHANNEL_SIZE);
        let use_bar = config.enable_progress_bars && std::io::stdout().is_terminal();
        let handle = tokio::spawn(render(rx, config, use_bar));
        (Self { handle }, tx)
    }

    /// Wait for the event stream to end and return the collected counters
    pub async fn finish(self) -> ProgressSummary {
        match self.handle.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Progress display task ended abnormally: {}", e);
                ProgressSummary::default()
            }
        }
    }
}

async fn render(
    mut rx: mpsc::Receiver<FetchProgress>,
    config: ProgressConfig,
    use_bar: bool,
) -> ProgressSummary {
    let start = Instant::now();
    let mut summary = ProgressSummary::default();
    let mut bar: Option<ProgressBar> = None;

    while let Some(event) = rx.recv().await {
        apply(&mut summary, &event);

        match event {
            FetchProgress::Started {
                groups,
                expected_bytes,
            } => {
                if use_bar {
                    bar = Some(new_bar(groups, expected_bytes, config.update_interval));
                } else {
                    info!(
                        "Fetching {} group(s){}",
                        groups,
                        expected_bytes
                            .map(|bytes| format!(", {} bytes", bytes))
                            .unwrap_or_default()
                    );
                }
            }
            FetchProgress::GroupCompleted { group, bytes } => match &bar {
                Some(bar) => {
                    if bar.length().is_some() {
                        bar.inc(bytes);
                    }
                    bar.set_message(format!("{}/{} groups", summary.completed, summary.groups));
                }
                None => debug!("Group {} complete: {} bytes", group, bytes),
            },
            FetchProgress::GroupRetry {
                group,
                attempt,
                error,
            } => {
                if config.show_retries {
                    let line = format!("Retrying group {} (attempt {}): {}", group, attempt, error);
                    match &bar {
                        Some(bar) => bar.println(line),
                        None => warn!("{}", line),
                    }
                }
            }
            FetchProgress::GroupFailed { group, error } => {
                let line = format!("Group {} failed: {}", group, error);
                match &bar {
                    Some(bar) => bar.println(line),
                    None => warn!("{}", line),
                }
            }
            FetchProgress::Finished { bytes, path } => match &bar {
                Some(bar) => bar.finish_with_message(format!("{} bytes -> {}", bytes, path.display())),
                None => info!("Wrote {} bytes to {}", bytes, path.display()),
            },
        }
    }

    if let Some(bar) = bar {
        if !bar.is_finished() {
            bar.abandon();
        }
    }
    summary.elapsed = start.elapsed();
    summary
}

fn apply(summary: &mut ProgressSummary, event: &FetchProgress) {
    match event {
        FetchProgress::Started { groups, .. } => summary.groups = *groups,
        FetchProgress::GroupCompleted { bytes, .. } => {
            summary.completed += 1;
            summary.bytes += bytes;
        }
        FetchProgress::GroupRetry { .. } => summary.retries += 1,
        FetchProgress::GroupFailed { .. } => summary.failed += 1,
        FetchProgress::Finished { .. } => {}
    }
}

fn new_bar(groups: usize, expected_bytes: Option<u64>, tick: Duration) -> ProgressBar {
    let bar = match expected_bytes {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("##-"),
            );
            bar
        }
        // Open-ended whole-file reads have no known length.
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        }
    };
    bar.set_message(format!("0/{} groups", groups));
    bar.enable_steady_tick(tick);
    bar
}
