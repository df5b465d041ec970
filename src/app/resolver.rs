//! Source resolution: which archive actually hosts a request
//!
//! Candidates come from the model template, filtered and reordered by the
//! configured priority. Each is probed in order with a metadata-only request;
//! subset retrievals additionally need the index next to the primary file.
//! Probe failures are retried with the configured policy and never reorder
//! candidates.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::catalog::{index_locations, ModelTemplate};
use crate::app::client::{GribClient, Presence, RetryPolicy};
use crate::app::fetcher::FetchConfig;
use crate::app::models::{Location, Request, Requirement, Source, SourceCandidate};
use crate::constants::sources;
use crate::errors::{ResolveError, ResolveResult};

/// Apply priority order and retention rules to a template's candidates
///
/// # Errors
///
/// Returns `UnknownSource` when the priority names a source the template lacks
pub fn effective_candidates(
    template: &dyn ModelTemplate,
    request: &Request,
    product: &str,
    config: &FetchConfig,
) -> ResolveResult<Vec<SourceCandidate>> {
    let all = template.sources(request, product);

    let ordered = match &config.priority {
        None => all,
        Some(priority) => {
            let mut ordered = Vec::with_capacity(priority.len());
            for name in priority {
                let name = name.trim().to_lowercase();
                if name == sources::LOCAL_SOURCE {
                    // Local copies are governed by `overwrite`, not priority.
                    continue;
                }
                let candidate = all
                    .iter()
                    .find(|candidate| candidate.name == name)
                    .ok_or_else(|| ResolveError::UnknownSource {
                        model: template.name().to_string(),
                        source_name: name.clone(),
                    })?;
                if !ordered.contains(candidate) {
                    ordered.push(candidate.clone());
                }
            }
            ordered
        }
    };

    let stale = request.age() > chrono::Duration::days(sources::NOMADS_RETENTION_DAYS);
    Ok(ordered
        .into_iter()
        .filter(|candidate| {
            let skip = stale && candidate.name == sources::NOMADS_SOURCE;
            if skip {
                debug!(
                    "Skipping {}: reference time older than {} days",
                    candidate.name,
                    sources::NOMADS_RETENTION_DAYS
                );
            }
            !skip
        })
        .collect())
}

/// Probes candidate sources for a request
#[derive(Debug, Clone)]
pub struct SourceResolver {
    client: Arc<GribClient>,
    retry_policy: RetryPolicy,
}

impl SourceResolver {
    pub fn new(client: Arc<GribClient>, retry_policy: RetryPolicy) -> Self {
        Self {
            client,
            retry_policy,
        }
    }

    /// Find the first source satisfying `requirement`
    ///
    /// `local_artifact` is the full local artifact path; when it exists and
    /// `overwrite` is off it is offered first as the `local` source.
    ///
    /// # Errors
    ///
    /// - `IndexUnavailable` when a subset was requested and primaries exist
    ///   without an index
    /// - `SourceExhausted` when no candidate hosts the primary file
    pub async fn resolve(
        &self,
        template: &dyn ModelTemplate,
        request: &Request,
        product: &str,
        config: &FetchConfig,
        requirement: Requirement,
        local_artifact: Option<&Path>,
    ) -> ResolveResult<Source> {
        if !config.overwrite {
            if let Some(path) = local_artifact {
                if let Some(source) = self.local_source(template, path, requirement).await {
                    info!("Using local copy {}", path.display());
                    return Ok(source);
                }
            }
        }

        let candidates = effective_candidates(template, request, product, config)?;
        let mut tried = Vec::with_capacity(candidates.len());
        let mut without_index: Option<(String, String)> = None;

        for (position, candidate) in candidates.iter().enumerate() {
            tried.push(candidate.name.clone());
            let primary = Location::parse(&candidate.primary)?;

            let Some(content_length) = self.exists(&candidate.name, &primary).await else {
                debug!("{}: {} not found", candidate.name, primary);
                continue;
            };

            let mut source = Source {
                name: candidate.name.clone(),
                rank: position + 1,
                primary,
                index: None,
                content_length,
            };

            if requirement == Requirement::Subset {
                source.index = self.find_index(template, &source).await;
                if source.index.is_none() {
                    debug!("{}: primary found but no index", candidate.name);
                    without_index.get_or_insert_with(|| {
                        (source.name.clone(), source.primary.to_string())
                    });
                    continue;
                }
            }

            info!("Resolved {} to {}", request, source);
            return Ok(source);
        }

        match without_index {
            Some((source_name, primary)) => Err(ResolveError::IndexUnavailable { source_name, primary }),
            None => Err(ResolveError::SourceExhausted {
                request: request.to_string(),
                tried,
            }),
        }
    }

    /// Local artifact as rank-0 source, when it satisfies the requirement
    async fn local_source(
        &self,
        template: &dyn ModelTemplate,
        path: &Path,
        requirement: Requirement,
    ) -> Option<Source> {
        let primary = Location::Local(path.to_path_buf());
        let content_length = self.exists(sources::LOCAL_SOURCE, &primary).await?;
        let mut source = Source {
            name: sources::LOCAL_SOURCE.to_string(),
            rank: 0,
            primary,
            index: None,
            content_length,
        };

        if requirement == Requirement::Subset {
            source.index = self.find_index(template, &source).await;
            source.index.as_ref()?;
        }
        Some(source)
    }

    /// First index location that exists for a source's primary
    async fn find_index(&self, template: &dyn ModelTemplate, source: &Source) -> Option<Location> {
        if !source.is_local() && !template.expects_index() {
            return None;
        }
        for index in index_locations(&source.primary, template.index_suffixes()) {
            if self.exists(&source.name, &index).await.is_some() {
                return Some(index);
            }
        }
        None
    }

    /// `Some(length)` when the resource exists; errors count as absent
    ///
    /// Reported lengths below the minimum mark placeholder files and count as
    /// absent. Servers that omit the length are believed.
    async fn exists(&self, source_name: &str, location: &Location) -> Option<Option<u64>> {
        let content_length = match location {
            Location::Local(path) => match tokio::fs::metadata(path).await {
                Ok(metadata) if metadata.is_file() => Some(metadata.len()),
                _ => return None,
            },
            Location::Remote(url) => match self.client.probe(source_name, url, &self.retry_policy).await {
                Ok(Presence::Found { content_length }) => content_length,
                Ok(Presence::Missing) => return None,
                Err(e) => {
                    warn!("{}: probe of {} failed: {}", source_name, url, e);
                    return None;
                }
            },
        };

        match content_length {
            Some(len) if len < sources::MIN_CONTENT_LENGTH => {
                debug!("{}: {} is only {} bytes", source_name, location, len);
                None
            }
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::catalog::noaa::Hrrr;
    use crate::app::client::ClientConfig;
    use chrono::{NaiveDate, Utc};
    use std::path::PathBuf;
    use tempfile::tempdir;

    /// Template whose sources are directories on disk
    struct DiskMirrors {
        roots: Vec<(String, PathBuf)>,
    }

    impl ModelTemplate for DiskMirrors {
        fn name(&self) -> &str {
            "disk"
        }

        fn description(&self) -> &str {
            "directories standing in for archives"
        }

        fn products(&self) -> &[(&str, &str)] {
            &[("sfc", "surface")]
        }

        fn sources(&self, _request: &Request, product: &str) -> Vec<SourceCandidate> {
            self.roots
                .iter()
                .map(|(name, root)| {
                    SourceCandidate::new(
                        name.as_str(),
                        root.join(format!("{}.grib2", product)).display().to_string(),
                    )
                })
                .collect()
        }
    }

    fn resolver() -> SourceResolver {
        SourceResolver::new(
            Arc::new(GribClient::new(&ClientConfig::default()).unwrap()),
            RetryPolicy::default(),
        )
    }

    fn request() -> Request {
        let time = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Request::new("disk", time, 0).unwrap()
    }

    fn mirrors(names: &[&str], root: &Path) -> DiskMirrors {
        DiskMirrors {
            roots: names
                .iter()
                .map(|name| {
                    let dir = root.join(name);
                    std::fs::create_dir_all(&dir).unwrap();
                    (name.to_string(), dir)
                })
                .collect(),
        }
    }

    #[test]
    fn test_priority_reorders_and_filters() {
        let request = Request::new("hrrr", Utc::now().naive_utc(), 0).unwrap();
        let config = FetchConfig::default().with_priority(["google", "AWS"]);
        let names: Vec<String> = effective_candidates(&Hrrr::conus(), &request, "sfc", &config)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["google", "aws"]);
    }

    #[test]
    fn test_unknown_priority_source_is_an_error() {
        let request = Request::new("hrrr", Utc::now().naive_utc(), 0).unwrap();
        let config = FetchConfig::default().with_priority(["azure"]);
        assert!(matches!(
            effective_candidates(&Hrrr::conus(), &request, "sfc", &config),
            Err(ResolveError::UnknownSource { .. })
        ));
    }

    #[test]
    fn test_nomads_dropped_for_old_runs() {
        let config = FetchConfig::default();
        let old = request();
        let names: Vec<String> = effective_candidates(&Hrrr::conus(), &old, "sfc", &config)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert!(!names.contains(&"nomads".to_string()));

        let recent = Request::new("hrrr", Utc::now().naive_utc(), 0).unwrap();
        let names: Vec<String> = effective_candidates(&Hrrr::conus(), &recent, "sfc", &config)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert!(names.contains(&"nomads".to_string()));
    }

    #[tokio::test]
    async fn test_subset_skips_source_without_index() {
        let dir = tempdir().unwrap();
        let template = mirrors(&["a", "b"], dir.path());
        std::fs::write(dir.path().join("a/sfc.grib2"), vec![1u8; 64]).unwrap();
        std::fs::write(dir.path().join("b/sfc.grib2"), vec![1u8; 64]).unwrap();
        std::fs::write(dir.path().join("b/sfc.grib2.idx"), "1:0:d=2024030100:TMP:sfc:anl:\n").unwrap();

        let config = FetchConfig::default();
        let source = resolver()
            .resolve(&template, &request(), "sfc", &config, Requirement::Subset, None)
            .await
            .unwrap();
        assert_eq!(source.name, "b");
        assert_eq!(source.rank, 2);
        assert!(source.has_index());

        let whole = resolver()
            .resolve(&template, &request(), "sfc", &config, Requirement::WholeFile, None)
            .await
            .unwrap();
        assert_eq!(whole.name, "a");
    }

    #[tokio::test]
    async fn test_index_unavailable_when_no_source_has_one() {
        let dir = tempdir().unwrap();
        let template = mirrors(&["a"], dir.path());
        std::fs::write(dir.path().join("a/sfc.grib2"), vec![1u8; 64]).unwrap();

        let result = resolver()
            .resolve(&template, &request(), "sfc", &FetchConfig::default(), Requirement::Subset, None)
            .await;
        assert!(matches!(result, Err(ResolveError::IndexUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_exhausted_lists_tried_sources() {
        let dir = tempdir().unwrap();
        let template = mirrors(&["a", "b"], dir.path());
        // A placeholder below the minimum size does not count.
        std::fs::write(dir.path().join("a/sfc.grib2"), b"tiny").unwrap();

        let result = resolver()
            .resolve(&template, &request(), "sfc", &FetchConfig::default(), Requirement::WholeFile, None)
            .await;
        match result {
            Err(ResolveError::SourceExhausted { tried, .. }) => assert_eq!(tried, vec!["a", "b"]),
            other => panic!("expected SourceExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_local_artifact_preferred_unless_overwrite() {
        let dir = tempdir().unwrap();
        let template = mirrors(&["a"], dir.path());
        std::fs::write(dir.path().join("a/sfc.grib2"), vec![1u8; 64]).unwrap();
        let local = dir.path().join("saved.grib2");
        std::fs::write(&local, vec![2u8; 64]).unwrap();

        let config = FetchConfig::default();
        let source = resolver()
            .resolve(&template, &request(), "sfc", &config, Requirement::WholeFile, Some(&local))
            .await
            .unwrap();
        assert_eq!(source.name, "local");
        assert_eq!(source.rank, 0);

        // Without a saved index the local copy cannot serve subsets.
        let result = resolver()
            .resolve(&template, &request(), "sfc", &config, Requirement::Subset, Some(&local))
            .await;
        assert!(matches!(result, Err(ResolveError::IndexUnavailable { .. })));

        let config = FetchConfig::default().with_overwrite(true);
        let source = resolver()
            .resolve(&template, &request(), "sfc", &config, Requirement::WholeFile, Some(&local))
            .await
            .unwrap();
        assert_eq!(source.name, "a");
    }
}
