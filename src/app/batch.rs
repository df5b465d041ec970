//! Many forecast files at once: every reference time crossed with every lead
//!
//! A [`ForecastBatch`] holds one [`ForecastFile`] per `(date, fxx)` pair in
//! date-then-lead order. Work on the files runs as one spawned task per file,
//! at most `max_files` at a time; each file still bounds its own range
//! requests. Results come back per file in batch order, so one failing file
//! never hides the others.

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::app::catalog::ModelRegistry;
use crate::app::client::GribClient;
use crate::app::fetcher::{DownloadResult, FetchConfig};
use crate::app::forecast::ForecastFile;
use crate::app::inventory::InventoryRecord;
use crate::app::models::{Request, Requirement, Source};
use crate::constants::workers;
use crate::errors::{AppError, Result};

/// Outcome of one file in a batch
#[derive(Debug)]
pub struct BatchItem<T> {
    pub request: Request,
    pub result: Result<T>,
}

impl<T> BatchItem<T> {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Build the request grid, ordered by reference time then lead time
///
/// # Errors
///
/// Returns an error for an empty grid or any reference time in the future
pub fn request_grid(
    model: &str,
    dates: &[NaiveDateTime],
    fxx: &[u32],
    product: Option<&str>,
    member: Option<u32>,
) -> Result<Vec<Request>> {
    if dates.is_empty() || fxx.is_empty() {
        return Err(AppError::generic(
            "A batch needs at least one reference time and one lead time",
        ));
    }

    let mut requests = Vec::with_capacity(dates.len() * fxx.len());
    for date in dates {
        for lead in fxx {
            let mut request = Request::new(model, *date, *lead)?;
            if let Some(product) = product {
                request = request.with_product(product);
            }
            if let Some(member) = member {
                request = request.with_member(member);
            }
            requests.push(request);
        }
    }
    Ok(requests)
}

/// A set of forecast files sharing one client and configuration
pub struct ForecastBatch {
    files: Vec<Arc<ForecastFile>>,
    max_files: usize,
}

impl ForecastBatch {
    /// Bind every request to its template
    ///
    /// # Errors
    ///
    /// Fails on the first request naming an unknown model or product
    pub fn new(
        registry: &ModelRegistry,
        requests: Vec<Request>,
        client: Arc<GribClient>,
        config: FetchConfig,
    ) -> Result<Self> {
        let files = requests
            .into_iter()
            .map(|request| {
                ForecastFile::new(registry, request, Arc::clone(&client), config.clone()).map(Arc::new)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            files,
            max_files: workers::DEFAULT_BATCH_FILES,
        })
    }

    /// Files worked on concurrently
    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files.max(1);
        self
    }

    pub fn files(&self) -> &[Arc<ForecastFile>] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Locate every file; failures mean the file is not hosted anywhere tried
    pub async fn resolve(&self, requirement: Requirement) -> Vec<BatchItem<Source>> {
        self.run_each("resolve", move |file| async move {
            file.resolve(requirement).await.cloned()
        })
        .await
    }

    /// Index records of every file, filtered by `pattern` when given
    pub async fn inventory(&self, pattern: Option<&str>) -> Vec<BatchItem<Vec<InventoryRecord>>> {
        let pattern = pattern.map(str::to_string);
        self.run_each("inventory", move |file| {
            let pattern = pattern.clone();
            async move {
                match pattern.as_deref() {
                    Some(pattern) => Ok(file.inventory_matching(pattern).await?.records().to_vec()),
                    None => Ok(file.inventory().await?.records().to_vec()),
                }
            }
        })
        .await
    }

    /// Download every file whole, or the messages matching `pattern`
    pub async fn download(&self, pattern: Option<&str>) -> Vec<BatchItem<DownloadResult>> {
        let pattern = pattern.map(str::to_string);
        self.run_each("download", move |file| {
            let pattern = pattern.clone();
            async move { file.download(pattern.as_deref()).await }
        })
        .await
    }

    /// One bounded task per file, joined in batch order
    async fn run_each<T, F, Fut>(&self, what: &str, operation: F) -> Vec<BatchItem<T>>
    where
        T: Send + 'static,
        F: Fn(Arc<ForecastFile>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        info!(
            "Running {} on {} file(s), {} at a time",
            what,
            self.files.len(),
            self.max_files
        );
        let semaphore = Arc::new(Semaphore::new(self.max_files));

        let handles: Vec<_> = self
            .files
            .iter()
            .map(|file| {
                let semaphore = Arc::clone(&semaphore);
                let work = operation(Arc::clone(file));
                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::generic(e.to_string()))?;
                    work.await
                })
            })
            .collect();

        let mut items = Vec::with_capacity(handles.len());
        for (file, handle) in self.files.iter().zip(handles) {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(AppError::generic(format!("{} task failed: {}", what, e))));
            if let Err(e) = &result {
                warn!("{} of {} failed: {}", what, file.request(), e);
            }
            items.push(BatchItem {
                request: file.request().clone(),
                result,
            });
        }

        let failed = items.iter().filter(|item| !item.succeeded()).count();
        if failed > 0 {
            warn!("{} failed for {}/{} file(s)", what, failed, items.len());
        }
        items
    }
}

impl std::fmt::Debug for ForecastBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastBatch")
            .field("files", &self.files.len())
            .field("max_files", &self.max_files)
            .finish()
    }
}
