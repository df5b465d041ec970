//! Latest-run discovery
//!
//! Walks back from the current model cycle until a run's primary file
//! resolves.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, Utc};
use tracing::{debug, info};

use crate::app::catalog::ModelRegistry;
use crate::app::client::GribClient;
use crate::app::fetcher::FetchConfig;
use crate::app::forecast::ForecastFile;
use crate::app::models::{Request, Requirement};
use crate::errors::{ResolveError, Result};

/// Floor `time` to a multiple of `interval` since the epoch
pub fn floor_to_cycle(time: NaiveDateTime, interval: ChronoDuration) -> NaiveDateTime {
    let step = interval.num_seconds().max(1);
    let seconds = time.and_utc().timestamp();
    let floored = seconds - seconds.rem_euclid(step);
    DateTime::from_timestamp(floored, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or(time)
}

/// Reference times to try, newest first
pub fn candidate_runs(now: NaiveDateTime, interval: ChronoDuration, periods: u32) -> Vec<NaiveDateTime> {
    let start = floor_to_cycle(now, interval);
    (0..periods.max(1))
        .map(|i| start - interval * i as i32)
        .collect()
}

/// Find the most recent run of `model` whose file for lead `fxx` is available
///
/// # Errors
///
/// Returns `SourceExhausted` when none of the last `periods` cycles resolves
pub async fn find_latest(
    registry: &ModelRegistry,
    client: Arc<GribClient>,
    config: &FetchConfig,
    model: &str,
    fxx: u32,
    product: Option<&str>,
    periods: u32,
) -> Result<ForecastFile> {
    let template = registry.get(model)?;
    let runs = candidate_runs(Utc::now().naive_utc(), template.cycle_interval(), periods);
    let mut tried = Vec::with_capacity(runs.len());

    for reference_time in runs {
        let mut request = Request::new(model, reference_time, fxx)?;
        if let Some(product) = product {
            request = request.with_product(product);
        }
        tried.push(reference_time.format("%Y-%m-%d %H:%M").to_string());

        let file = ForecastFile::new(registry, request, Arc::clone(&client), config.clone())?;
        match file.resolve(Requirement::WholeFile).await {
            Ok(source) => {
                info!("Latest available {} run is {}", model, reference_time.format("%Y-%m-%d %H:%M"));
                debug!("Resolved via {}", source);
                return Ok(file);
            }
            Err(e) => debug!("{} run {} not available: {}", model, reference_time, e),
        }
    }

    Err(ResolveError::SourceExhausted {
        request: format!("latest {} run for F{:02}", model, fxx),
        tried,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, m, 17)
            .unwrap()
    }

    #[test]
    fn test_floor_to_cycle() {
        assert_eq!(floor_to_cycle(at(13, 42), ChronoDuration::hours(1)), at(13, 0) - ChronoDuration::seconds(17));
        assert_eq!(floor_to_cycle(at(13, 42), ChronoDuration::hours(6)), at(12, 0) - ChronoDuration::seconds(17));
    }

    #[test]
    fn test_candidate_runs_step_back_one_cycle() {
        let runs = candidate_runs(at(13, 42), ChronoDuration::hours(6), 3);
        let hours: Vec<String> = runs.iter().map(|t| t.format("%d %H:%M").to_string()).collect();
        assert_eq!(hours, vec!["01 12:00", "01 06:00", "01 00:00"]);

        assert_eq!(candidate_runs(at(1, 0), ChronoDuration::hours(1), 0).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_model() {
        let registry = ModelRegistry::with_builtin();
        let client = Arc::new(GribClient::new(&crate::app::client::ClientConfig::default()).unwrap());
        let result = find_latest(&registry, client, &FetchConfig::default(), "nam", 0, None, 2).await;
        assert!(matches!(
            result,
            Err(crate::errors::AppError::Resolve(ResolveError::UnknownModel { .. }))
        ));
    }
}
