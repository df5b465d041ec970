//! Concurrent byte-range retrieval and assembly
//!
//! Each [`SubsetGroup`] becomes one task. Output offsets are fixed before any
//! task starts: group `i` lands right after the bytes of groups `0..i`, so
//! tasks write disjoint regions of a shared `.tmp` file through their own
//! handles and the result keeps inventory order whatever order they finish in.
//!
//! A group that exhausts its retries flags the rest of the batch: siblings
//! finish their current attempt but schedule no further retries. Failed
//! output is renamed to `.partial` or removed, never left under the final
//! name.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::app::artifact;
use crate::app::client::{GribClient, RetryPolicy};
use crate::app::inventory::ByteRange;
use crate::app::models::{Location, Source};
use crate::app::subset::{Selection, SubsetGroup};
use crate::errors::{FetchError, FetchResult};

pub mod config;
pub mod types;

pub use config::FetchConfig;
pub use types::{DownloadResult, FetchProgress, GroupOutcome};

/// Where one group's bytes come from and go to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupPlan {
    pub index: usize,
    pub range: ByteRange,
    pub output_offset: u64,
}

/// Assign each group its output offset: the running total of earlier group lengths
///
/// Only the last group may be open-ended, so every offset is known up front.
pub fn plan_groups(groups: &[SubsetGroup]) -> Vec<GroupPlan> {
    let mut offset = 0;
    groups
        .iter()
        .map(|group| {
            let plan = GroupPlan {
                index: group.index,
                range: group.range,
                output_offset: offset,
            };
            offset += group.range.len().unwrap_or(0);
            plan
        })
        .collect()
}

/// Compare the assembled file length with what the groups account for
///
/// Closed groups count their span; an open final group counts what it wrote.
pub fn check_assembled_len(outcomes: &[GroupOutcome], actual: u64) -> FetchResult<u64> {
    let expected: u64 = outcomes
        .iter()
        .map(|outcome| outcome.range.len().unwrap_or(outcome.bytes))
        .sum();
    if actual != expected {
        return Err(FetchError::ByteCountMismatch { expected, actual });
    }
    Ok(actual)
}

/// Fetches selections from a resolved source into local artifacts
#[derive(Debug, Clone)]
pub struct RangeFetcher {
    client: Arc<GribClient>,
    retry_policy: RetryPolicy,
    max_parallel: usize,
    keep_partial: bool,
    progress: Option<mpsc::Sender<FetchProgress>>,
}

impl RangeFetcher {
    pub fn new(client: Arc<GribClient>, config: &FetchConfig) -> Self {
        Self {
            client,
            retry_policy: config.retry_policy(),
            max_parallel: config.max_parallel.max(1),
            keep_partial: config.keep_partial,
            progress: None,
        }
    }

    /// Report progress events on `sender`
    pub fn with_progress(mut self, sender: mpsc::Sender<FetchProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Fetch every group of `selection` from `source` into `destination`
    ///
    /// # Errors
    ///
    /// - `EmptySelection` when the selection has no groups
    /// - `GroupFetchFailed` when any group fails permanently or exhausts retries
    /// - `ByteCountMismatch` when the assembled length disagrees with the group spans
    pub async fn fetch(
        &self,
        source: &Source,
        selection: &Selection,
        destination: &Path,
    ) -> FetchResult<DownloadResult> {
        if selection.is_empty() {
            return Err(FetchError::EmptySelection {
                pattern: selection.pattern().unwrap_or_default().to_string(),
            });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let plans = plan_groups(selection.groups());
        let temp_path = artifact::temp_path(destination);
        File::create(&temp_path).await?;

        info!(
            "Fetching {} group(s) from {} into {}",
            plans.len(),
            source,
            destination.display()
        );
        emit(
            &self.progress,
            FetchProgress::Started {
                groups: plans.len(),
                expected_bytes: selection.expected_len(),
            },
        )
        .await;

        let outcomes = self.run_groups(source, &plans, &temp_path).await;

        let failed = outcomes.iter().filter(|outcome| !outcome.succeeded()).count();
        if failed > 0 {
            for outcome in outcomes.iter().filter(|outcome| !outcome.succeeded()) {
                error!(
                    "Group {} ({}) failed: {}",
                    outcome.index,
                    outcome.range,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
            let partial = self.discard(&temp_path, destination).await;
            return Err(FetchError::GroupFetchFailed {
                failed,
                total: outcomes.len(),
                partial,
            });
        }

        let actual = tokio::fs::metadata(&temp_path).await?.len();
        if let Err(e) = check_assembled_len(&outcomes, actual) {
            error!("Assembled output {} is inconsistent: {}", destination.display(), e);
            self.discard(&temp_path, destination).await;
            return Err(e);
        }

        tokio::fs::rename(&temp_path, destination)
            .await
            .map_err(|_e| FetchError::AtomicOperationFailed {
                temp_path: temp_path.clone(),
                final_path: destination.to_path_buf(),
            })?;

        info!("Saved {} ({} bytes)", destination.display(), actual);
        emit(
            &self.progress,
            FetchProgress::Finished {
                bytes: actual,
                path: destination.to_path_buf(),
            },
        )
        .await;

        Ok(DownloadResult {
            path: destination.to_path_buf(),
            source: source.name.clone(),
            bytes_written: actual,
            records: selection.labels(),
            groups: outcomes,
            reused: false,
        })
    }

    /// Spawn one bounded task per group and collect outcomes in group order
    async fn run_groups(&self, source: &Source, plans: &[GroupPlan], temp_path: &Path) -> Vec<GroupOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let task = GroupTask {
            client: Arc::clone(&self.client),
            source_name: source.name.clone(),
            primary: source.primary.clone(),
            temp_path: temp_path.to_path_buf(),
            retry_policy: self.retry_policy,
            cancelled: Arc::new(AtomicBool::new(false)),
            progress: self.progress.clone(),
        };

        let handles: Vec<_> = plans
            .iter()
            .map(|plan| {
                let task = task.clone();
                let semaphore = Arc::clone(&semaphore);
                let plan = *plan;
                tokio::spawn(async move {
                    match semaphore.acquire_owned().await {
                        Ok(_permit) => task.run(plan).await,
                        Err(e) => GroupOutcome {
                            index: plan.index,
                            range: plan.range,
                            output_offset: plan.output_offset,
                            bytes: 0,
                            attempts: 0,
                            error: Some(e.to_string()),
                        },
                    }
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (plan, handle) in plans.iter().zip(handles) {
            let outcome = handle.await.unwrap_or_else(|e| {
                let error = FetchError::TaskJoin {
                    group: plan.index,
                    reason: e.to_string(),
                };
                GroupOutcome {
                    index: plan.index,
                    range: plan.range,
                    output_offset: plan.output_offset,
                    bytes: 0,
                    attempts: 0,
                    error: Some(error.to_string()),
                }
            });
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Move failed output out of the way; returns the `.partial` path when kept
    async fn discard(&self, temp_path: &Path, destination: &Path) -> Option<PathBuf> {
        if self.keep_partial {
            let partial = artifact::partial_path(destination);
            match tokio::fs::rename(temp_path, &partial).await {
                Ok(()) => {
                    warn!("Incomplete output kept as {}", partial.display());
                    return Some(partial);
                }
                Err(e) => warn!("Could not keep partial output {}: {}", partial.display(), e),
            }
        }
        if let Err(e) = tokio::fs::remove_file(temp_path).await {
            warn!("Could not remove {}: {}", temp_path.display(), e);
        }
        None
    }
}

/// State shared by every group task of one retrieval
#[derive(Debug, Clone)]
struct GroupTask {
    client: Arc<GribClient>,
    source_name: String,
    primary: Location,
    temp_path: PathBuf,
    retry_policy: RetryPolicy,
    cancelled: Arc<AtomicBool>,
    progress: Option<mpsc::Sender<FetchProgress>>,
}

impl GroupTask {
    async fn run(self, plan: GroupPlan) -> GroupOutcome {
        let mut attempt = 0;
        loop {
            match self.fetch_once(&plan).await {
                Ok(bytes) => {
                    debug!("Group {} ({}) wrote {} bytes", plan.index, plan.range, bytes);
                    emit(
                        &self.progress,
                        FetchProgress::GroupCompleted {
                            group: plan.index,
                            bytes,
                        },
                    )
                    .await;
                    return self.outcome(&plan, bytes, attempt + 1, None);
                }
                Err(e)
                    if self.retry_policy.should_retry(attempt, &e)
                        && !self.cancelled.load(Ordering::SeqCst) =>
                {
                    let delay = self.retry_policy.backoff_duration(attempt);
                    attempt += 1;
                    warn!(
                        "Group {} ({}) failed (attempt {}/{}): {}. Retrying in {}ms",
                        plan.index,
                        plan.range,
                        attempt,
                        self.retry_policy.max_retries + 1,
                        e,
                        delay.as_millis()
                    );
                    emit(
                        &self.progress,
                        FetchProgress::GroupRetry {
                            group: plan.index,
                            attempt,
                            error: e.to_string(),
                        },
                    )
                    .await;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let error = if self.cancelled.load(Ordering::SeqCst) {
                        format!("abandoned after another group failed: {}", e)
                    } else if e.is_transient() {
                        FetchError::MaxRetriesExceeded {
                            max_retries: self.retry_policy.max_retries,
                            last_error: e.to_string(),
                        }
                        .to_string()
                    } else {
                        e.to_string()
                    };
                    self.cancelled.store(true, Ordering::SeqCst);
                    emit(
                        &self.progress,
                        FetchProgress::GroupFailed {
                            group: plan.index,
                            error: error.clone(),
                        },
                    )
                    .await;
                    return self.outcome(&plan, 0, attempt + 1, Some(error));
                }
            }
        }
    }

    fn outcome(&self, plan: &GroupPlan, bytes: u64, attempts: u32, error: Option<String>) -> GroupOutcome {
        GroupOutcome {
            index: plan.index,
            range: plan.range,
            output_offset: plan.output_offset,
            bytes,
            attempts,
            error,
        }
    }

    /// One attempt: copy the group's span into its output region
    async fn fetch_once(&self, plan: &GroupPlan) -> FetchResult<u64> {
        let mut output = OpenOptions::new().write(true).open(&self.temp_path).await?;
        output.seek(SeekFrom::Start(plan.output_offset)).await?;

        let written = match &self.primary {
            Location::Remote(url) => self.copy_remote(url, &plan.range, &mut output).await?,
            Location::Local(path) => copy_local(path, &plan.range, &mut output).await?,
        };
        output.flush().await?;

        match plan.range.len() {
            Some(expected) if written < expected => Err(FetchError::ShortRead {
                range: plan.range.to_string(),
                expected,
                received: written,
            }),
            Some(expected) if written > expected => Err(FetchError::ByteCountMismatch {
                expected,
                actual: written,
            }),
            _ => Ok(written),
        }
    }

    /// Stream a range response into `output`, never past the requested span
    async fn copy_remote<W>(&self, url: &Url, range: &ByteRange, output: &mut W) -> FetchResult<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let response = self.client.get_range(&self.source_name, url, range).await?;
        let mut stream = response.bytes_stream();
        let limit = range.len();
        let mut received: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let writable = match limit {
                Some(limit) => {
                    let remaining = limit.saturating_sub(received);
                    chunk.len().min(usize::try_from(remaining).unwrap_or(usize::MAX))
                }
                None => chunk.len(),
            };
            output.write_all(&chunk[..writable]).await?;
            received += chunk.len() as u64;
        }
        Ok(received)
    }
}

/// Copy a span of a local primary file into `output`
async fn copy_local<W>(path: &Path, range: &ByteRange, output: &mut W) -> FetchResult<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut input = File::open(path).await?;
    input.seek(SeekFrom::Start(range.start)).await?;
    let copied = match range.len() {
        Some(len) => tokio::io::copy(&mut input.take(len), output).await?,
        None => tokio::io::copy(&mut input, output).await?,
    };
    Ok(copied)
}

async fn emit(progress: &Option<mpsc::Sender<FetchProgress>>, event: FetchProgress) {
    if let Some(sender) = progress {
        // A dropped receiver only means nobody is watching.
        let _ = sender.send(event).await;
    }
}
