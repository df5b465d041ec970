//! One logical forecast file: resolve, inventory, subset and download
//!
//! [`ForecastFile`] ties a [`Request`] to its model template, the shared
//! client and an explicit [`FetchConfig`]. Resolution and the parsed
//! inventory are memoized, so inventory-then-download probes each archive
//! once.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, OnceCell};
use tracing::{debug, info, warn};

use crate::app::artifact;
use crate::app::catalog::{resolve_product, ModelRegistry, ModelTemplate};
use crate::app::client::GribClient;
use crate::app::fetcher::{DownloadResult, FetchConfig, FetchProgress, RangeFetcher};
use crate::app::inventory::Inventory;
use crate::app::models::{Location, Request, Requirement, Source};
use crate::app::resolver::SourceResolver;
use crate::app::subset::{self, Selection};
use crate::errors::{FetchError, IndexError, Result};

/// A request bound to its template, client and configuration
pub struct ForecastFile {
    request: Request,
    template: Arc<dyn ModelTemplate>,
    product: String,
    client: Arc<GribClient>,
    config: FetchConfig,
    whole_file_source: OnceCell<Source>,
    subset_source: OnceCell<Source>,
    inventory: OnceCell<Arc<Inventory>>,
}

impl ForecastFile {
    /// Bind a request to the registered template for its model
    ///
    /// # Errors
    ///
    /// Returns an error for unknown models or products, or invalid configuration
    pub fn new(
        registry: &ModelRegistry,
        request: Request,
        client: Arc<GribClient>,
        config: FetchConfig,
    ) -> Result<Self> {
        config.validate()?;
        let template = registry.get(request.model())?;
        let product = resolve_product(template.as_ref(), &request)?;
        Ok(Self {
            request,
            template,
            product,
            client,
            config,
            whole_file_source: OnceCell::new(),
            subset_source: OnceCell::new(),
            inventory: OnceCell::new(),
        })
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn template(&self) -> &dyn ModelTemplate {
        self.template.as_ref()
    }

    /// Product in use, after applying the template default
    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Path of the full local artifact
    pub fn full_path(&self) -> PathBuf {
        artifact::full_path(
            &self.config.save_dir,
            self.template.name(),
            &self.request,
            &self.template.local_file_name(&self.request, &self.product),
        )
    }

    /// Path of the artifact a download with `pattern` produces
    pub fn local_path(&self, pattern: Option<&str>) -> PathBuf {
        artifact::artifact_path(&self.full_path(), &self.request, pattern)
    }

    /// Resolve the hosting source, memoized per requirement
    pub async fn resolve(&self, requirement: Requirement) -> Result<&Source> {
        if requirement == Requirement::WholeFile {
            // A subset-capable source also serves whole files.
            if let Some(source) = self.subset_source.get() {
                return Ok(source);
            }
        }

        let cell = match requirement {
            Requirement::WholeFile => &self.whole_file_source,
            Requirement::Subset => &self.subset_source,
        };
        let full_path = self.full_path();
        let source = cell
            .get_or_try_init(|| async {
                SourceResolver::new(Arc::clone(&self.client), self.config.retry_policy())
                    .resolve(
                        self.template.as_ref(),
                        &self.request,
                        &self.product,
                        &self.config,
                        requirement,
                        Some(full_path.as_path()),
                    )
                    .await
            })
            .await?;
        Ok(source)
    }

    /// Fetch and parse the index of the resolved source, memoized
    pub async fn inventory(&self) -> Result<Arc<Inventory>> {
        let inventory = self
            .inventory
            .get_or_try_init(|| async {
                let source = self.resolve(Requirement::Subset).await?;
                let inventory = self.load_inventory(source).await?;
                Ok::<_, crate::errors::AppError>(Arc::new(inventory))
            })
            .await?;
        Ok(Arc::clone(inventory))
    }

    async fn load_inventory(&self, source: &Source) -> Result<Inventory> {
        let Some(index) = &source.index else {
            return Err(crate::errors::ResolveError::IndexUnavailable {
                source_name: source.name.clone(),
                primary: source.primary.to_string(),
            }
            .into());
        };

        let text = match index {
            Location::Remote(url) => self
                .client
                .get_text(&source.name, url, &self.config.retry_policy())
                .await
                .map_err(IndexError::Fetch)?,
            Location::Local(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(IndexError::Io)?,
        };
        let inventory = self
            .template
            .index_grammar()
            .parse(&text, &index.to_string())?;
        debug!("Parsed {} index records from {}", inventory.len(), index);

        if self.config.save_index && !index.is_local() {
            self.save_index_copy(index, &text).await;
        }
        Ok(inventory)
    }

    /// Keep a copy of a remote index beside the full artifact
    async fn save_index_copy(&self, index: &Location, text: &str) {
        let Some(path) = artifact::index_copy_path(&self.full_path(), index) else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Could not create {}: {}", parent.display(), e);
                return;
            }
        }
        match tokio::fs::write(&path, text).await {
            Ok(()) => debug!("Saved index copy {}", path.display()),
            Err(e) => warn!("Could not save index copy {}: {}", path.display(), e),
        }
    }

    /// Records matching `pattern`, grouped for retrieval
    pub async fn inventory_matching(&self, pattern: &str) -> Result<Selection> {
        let inventory = self.inventory().await?;
        Ok(subset::select(&inventory, pattern)?)
    }

    /// Download the whole file (`None` or `":"`) or the records matching `pattern`
    pub async fn download(&self, pattern: Option<&str>) -> Result<DownloadResult> {
        self.download_inner(pattern, None).await
    }

    /// As [`download`](Self::download), reporting progress on `progress`
    pub async fn download_with_progress(
        &self,
        pattern: Option<&str>,
        progress: mpsc::Sender<FetchProgress>,
    ) -> Result<DownloadResult> {
        self.download_inner(pattern, Some(progress)).await
    }

    async fn download_inner(
        &self,
        pattern: Option<&str>,
        progress: Option<mpsc::Sender<FetchProgress>>,
    ) -> Result<DownloadResult> {
        let destination = self.local_path(pattern);

        if !self.config.overwrite {
            if let Ok(metadata) = tokio::fs::metadata(&destination).await {
                if metadata.is_file() {
                    info!("{} already exists; not downloading", destination.display());
                    return Ok(DownloadResult::reused(destination, metadata.len()));
                }
            }
        }

        let (source, selection) = if subset::selects_everything(pattern) {
            (self.resolve(Requirement::WholeFile).await?, Selection::whole_file())
        } else {
            let pattern = pattern.unwrap_or_default();
            let selection = self.inventory_matching(pattern).await?;
            if selection.is_empty() {
                warn!("Pattern {:?} matched no records in {}", pattern, self.request);
                return Err(FetchError::EmptySelection {
                    pattern: pattern.to_string(),
                }
                .into());
            }
            info!(
                "Pattern {:?} selected {} record(s) in {} group(s)",
                pattern,
                selection.records().len(),
                selection.groups().len()
            );
            (self.resolve(Requirement::Subset).await?, selection)
        };

        let mut fetcher = RangeFetcher::new(Arc::clone(&self.client), &self.config);
        if let Some(progress) = progress {
            fetcher = fetcher.with_progress(progress);
        }
        Ok(fetcher.fetch(source, &selection, &destination).await?)
    }
}

impl std::fmt::Debug for ForecastFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForecastFile")
            .field("request", &self.request)
            .field("product", &self.product)
            .field("source", &self.whole_file_source.get().or(self.subset_source.get()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::ClientConfig;
    use crate::app::models::SourceCandidate;
    use crate::errors::AppError;
    use chrono::NaiveDate;
    use std::path::Path;
    use tempfile::tempdir;

    const INDEX: &str = "\
1:0:d=2024030100:TMP:2 m above ground:anl:
2:100:d=2024030100:UGRD:10 m above ground:anl:
3:200:d=2024030100:VGRD:10 m above ground:anl:
";

    /// Single archive in a local directory
    struct Mirror {
        root: PathBuf,
    }

    impl ModelTemplate for Mirror {
        fn name(&self) -> &str {
            "mirror"
        }

        fn description(&self) -> &str {
            "directory mirror"
        }

        fn products(&self) -> &[(&str, &str)] {
            &[("sfc", "surface")]
        }

        fn sources(&self, request: &Request, product: &str) -> Vec<SourceCandidate> {
            vec![SourceCandidate::new(
                "disk",
                self.root
                    .join(format!("{}.{}.f{:02}.grib2", request.date_stamp(), product, request.fxx()))
                    .display()
                    .to_string(),
            )]
        }
    }

    fn setup(root: &Path) -> ModelRegistry {
        let archive = root.join("archive");
        std::fs::create_dir_all(&archive).unwrap();
        let payload: Vec<u8> = (0..300u32).map(|i| (i % 200) as u8).collect();
        std::fs::write(archive.join("20240301.sfc.f00.grib2"), payload).unwrap();
        std::fs::write(archive.join("20240301.sfc.f00.grib2.idx"), INDEX).unwrap();

        let mut registry = ModelRegistry::new();
        registry.register("mirror", Arc::new(Mirror { root: archive }));
        registry
    }

    fn forecast(registry: &ModelRegistry, save_dir: &Path) -> ForecastFile {
        let time = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let request = Request::new("mirror", time, 0).unwrap();
        let client = Arc::new(GribClient::new(&ClientConfig::default()).unwrap());
        let config = FetchConfig::default().with_save_dir(save_dir);
        ForecastFile::new(registry, request, client, config).unwrap()
    }

    #[tokio::test]
    async fn test_inventory_is_memoized() {
        let dir = tempdir().unwrap();
        let registry = setup(dir.path());
        let file = forecast(&registry, &dir.path().join("out"));

        let first = file.inventory().await.unwrap();
        let second = file.inventory().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);
        assert_eq!(file.resolve(Requirement::WholeFile).await.unwrap().name, "disk");
    }

    #[tokio::test]
    async fn test_subset_download_and_rerun_reuses_artifact() {
        let dir = tempdir().unwrap();
        let registry = setup(dir.path());
        let file = forecast(&registry, &dir.path().join("out"));

        let result = file.download(Some(":(TMP|VGRD):")).await.unwrap();
        assert_eq!(result.bytes_written, 200);
        assert!(!result.reused);
        assert!(result
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("subset_"));

        let again = file.download(Some(":(TMP|VGRD):")).await.unwrap();
        assert!(again.reused);
        assert_eq!(again.requests(), 0);
        assert_eq!(again.path, result.path);
    }

    #[tokio::test]
    async fn test_empty_selection_is_reported() {
        let dir = tempdir().unwrap();
        let registry = setup(dir.path());
        let file = forecast(&registry, &dir.path().join("out"));

        let result = file.download(Some(":SNOW:")).await;
        assert!(matches!(
            result,
            Err(AppError::Fetch(FetchError::EmptySelection { .. }))
        ));
        assert!(!file.local_path(Some(":SNOW:")).exists());
    }

    #[tokio::test]
    async fn test_whole_file_download_path() {
        let dir = tempdir().unwrap();
        let registry = setup(dir.path());
        let file = forecast(&registry, &dir.path().join("out"));

        let result = file.download(Some(":")).await.unwrap();
        assert_eq!(result.path, file.full_path());
        assert_eq!(result.bytes_written, 300);
        assert!(result
            .path
            .ends_with("mirror/20240301/20240301.sfc.f00.grib2"));
    }

    #[test]
    fn test_unknown_product_rejected() {
        let dir = tempdir().unwrap();
        let registry = setup(dir.path());
        let time = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let request = Request::new("mirror", time, 0).unwrap().with_product("prs");
        let client = Arc::new(GribClient::new(&ClientConfig::default()).unwrap());
        let result = ForecastFile::new(&registry, request, client, FetchConfig::default());
        assert!(matches!(
            result,
            Err(AppError::Resolve(crate::errors::ResolveError::UnknownProduct { .. }))
        ));
    }
}
