//! End-to-end retrievals against a mock HTTP archive

mod common;

use std::time::Duration;

use grib_fetcher::app::{FetchProgress, ForecastFile};
use grib_fetcher::errors::{AppError, FetchError, IndexError, ResolveError};
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{header, header_exists, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

async fn forecast(server: &MockServer, save_dir: &TempDir) -> ForecastFile {
    let registry = registry(server, &["alpha", "beta"]);
    ForecastFile::new(&registry, request(), client(), fetch_config(save_dir.path())).unwrap()
}

#[tokio::test]
async fn subset_of_two_groups_is_assembled_in_order() {
    let server = MockServer::start().await;
    serve_source(&server, "alpha", &request()).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let result = file.download(Some(":(TMP|VGRD):")).await.unwrap();

    let payload = payload();
    let expected: Vec<u8> = payload[0..100]
        .iter()
        .chain(payload[200..300].iter())
        .copied()
        .collect();
    let written = tokio::fs::read(&result.path).await.unwrap();

    assert_eq!(written, expected);
    assert_eq!(result.bytes_written, 200);
    assert_eq!(result.records, vec!["1".to_string(), "3".to_string()]);
    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.source, "alpha");
    assert_eq!(range_requests(&server).await, 2);
    assert!(result
        .path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("subset_"));
}

#[tokio::test]
async fn adjacent_records_share_one_range_request() {
    let server = MockServer::start().await;
    serve_source(&server, "alpha", &request()).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let result = file.download(Some(":[UV]GRD:")).await.unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.bytes_written, 200);
    assert_eq!(range_requests(&server).await, 1);
    let written = tokio::fs::read(&result.path).await.unwrap();
    assert_eq!(written, payload()[100..300].to_vec());
}

#[tokio::test]
async fn full_coverage_pattern_yields_the_whole_file() {
    let server = MockServer::start().await;
    serve_source(&server, "alpha", &request()).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let subset = file.download(Some("GRD|TMP")).await.unwrap();
    let whole = file.download(None).await.unwrap();

    let subset_bytes = tokio::fs::read(&subset.path).await.unwrap();
    let whole_bytes = tokio::fs::read(&whole.path).await.unwrap();
    assert_eq!(subset_bytes, payload());
    assert_eq!(whole_bytes, payload());
    assert_ne!(subset.path, whole.path);
    assert_eq!(whole.path, file.full_path());
}

#[tokio::test]
async fn partitioning_patterns_reconstruct_the_file() {
    let server = MockServer::start().await;
    serve_source(&server, "alpha", &request()).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let first = file.download(Some(":TMP:")).await.unwrap();
    let rest = file.download(Some(":[UV]GRD:")).await.unwrap();

    let mut joined = tokio::fs::read(&first.path).await.unwrap();
    joined.extend(tokio::fs::read(&rest.path).await.unwrap());
    assert_eq!(joined, payload());
}

#[tokio::test]
async fn rerun_without_overwrite_makes_no_range_requests() {
    let server = MockServer::start().await;
    serve_source(&server, "alpha", &request()).await;
    let save_dir = TempDir::new().unwrap();

    let first = forecast(&server, &save_dir)
        .await
        .download(Some(":TMP:"))
        .await
        .unwrap();
    let before = range_requests(&server).await;

    let second = forecast(&server, &save_dir)
        .await
        .download(Some(":TMP:"))
        .await
        .unwrap();

    assert!(second.reused);
    assert_eq!(second.requests(), 0);
    assert_eq!(second.path, first.path);
    assert_eq!(range_requests(&server).await, before);
}

#[tokio::test]
async fn corrupt_index_fails_before_any_range_request() {
    let server = MockServer::start().await;
    let request = request();
    serve_file(&server, &file_path("alpha", &request), payload()).await;
    serve_file(
        &server,
        &index_path("alpha", &request),
        b"1:0:d=2024030106:TMP:2 m above ground:anl:\nnot an index line\n".to_vec(),
    )
    .await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let result = file.download(Some(":TMP:")).await;

    assert!(matches!(
        result,
        Err(AppError::Index(IndexError::Corrupt { line: 2, .. }))
    ));
    assert!(!file.local_path(Some(":TMP:")).exists());
    assert_eq!(range_requests(&server).await, 0);
}

#[tokio::test]
async fn source_without_index_falls_through_to_next() {
    let server = MockServer::start().await;
    let request = request();
    serve_file(&server, &file_path("alpha", &request), payload()).await;
    serve_source(&server, "beta", &request).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let result = file.download(Some(":TMP:")).await.unwrap();

    assert_eq!(result.source, "beta");
    assert_eq!(result.bytes_written, 100);
}

#[tokio::test]
async fn missing_index_everywhere_offers_full_file_fallback() {
    let server = MockServer::start().await;
    let request = request();
    serve_file(&server, &file_path("alpha", &request), payload()).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let err = file.download(Some(":TMP:")).await.unwrap_err();
    assert!(matches!(
        err,
        AppError::Resolve(ResolveError::IndexUnavailable { .. })
    ));
    assert!(err.offers_full_file_fallback());

    let whole = file.download(None).await.unwrap();
    assert_eq!(tokio::fs::read(&whole.path).await.unwrap(), payload());
}

#[tokio::test]
async fn pattern_matching_nothing_writes_nothing() {
    let server = MockServer::start().await;
    serve_source(&server, "alpha", &request()).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let result = file.download(Some(":HGT:500 mb:")).await;

    assert!(matches!(
        result,
        Err(AppError::Fetch(FetchError::EmptySelection { .. }))
    ));
    assert!(!file.local_path(Some(":HGT:500 mb:")).exists());
    assert_eq!(range_requests(&server).await, 0);
}

#[tokio::test]
async fn transient_range_failure_is_retried() {
    let server = MockServer::start().await;
    let request = request();
    Mock::given(path(file_path("alpha", &request)))
        .and(header_exists("range"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    serve_source(&server, "alpha", &request).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let result = file.download(Some(":TMP:")).await.unwrap();

    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.groups[0].attempts, 2);
    assert_eq!(result.requests(), 2);
    assert_eq!(
        tokio::fs::read(&result.path).await.unwrap(),
        payload()[0..100].to_vec()
    );
}

#[tokio::test]
async fn exhausted_group_leaves_partial_output() {
    let server = MockServer::start().await;
    let request = request();
    Mock::given(path(file_path("alpha", &request)))
        .and(header_exists("range"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    serve_source(&server, "alpha", &request).await;
    let save_dir = TempDir::new().unwrap();
    let registry = registry(&server, &["alpha"]);
    let mut config = fetch_config(save_dir.path());
    config.keep_partial = true;
    config.retry_max_delay = Duration::from_millis(10);
    let file = ForecastFile::new(&registry, request, client(), config).unwrap();

    let err = file.download(Some(":TMP:")).await.unwrap_err();

    match err {
        AppError::Fetch(FetchError::GroupFetchFailed {
            failed,
            total,
            partial,
        }) => {
            assert_eq!((failed, total), (1, 1));
            let partial = partial.expect("partial output kept");
            assert!(partial.to_string_lossy().ends_with(".partial"));
            assert!(partial.exists());
        }
        other => panic!("expected GroupFetchFailed, got {:?}", other),
    }
    assert!(!file.local_path(Some(":TMP:")).exists());
}

/// Download with a progress channel; returns the outcome and every group failure message
async fn download_collecting_failures(
    file: &ForecastFile,
    pattern: &str,
) -> (Result<grib_fetcher::app::DownloadResult, AppError>, Vec<(usize, String)>) {
    let (tx, mut rx) = mpsc::channel(64);
    let result = file.download_with_progress(Some(pattern), tx).await;
    let mut failures = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let FetchProgress::GroupFailed { group, error } = event {
            failures.push((group, error));
        }
    }
    (result, failures)
}

async fn requests_with_range(server: &MockServer, range: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| {
            request
                .headers
                .get("range")
                .and_then(|value| value.to_str().ok())
                == Some(range)
        })
        .count()
}

#[tokio::test]
async fn overlong_range_body_is_a_byte_count_mismatch() {
    let server = MockServer::start().await;
    let request = request();
    Mock::given(path(file_path("alpha", &request)))
        .and(header("range", "bytes=0-99"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-99/300")
                .set_body_bytes(payload()[0..150].to_vec()),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    serve_source(&server, "alpha", &request).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let (result, failures) = download_collecting_failures(&file, ":TMP:").await;

    assert!(matches!(
        result,
        Err(AppError::Fetch(FetchError::GroupFetchFailed {
            failed: 1,
            total: 1,
            partial: None
        }))
    ));
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.contains("Byte count mismatch"), "{}", failures[0].1);
    assert_eq!(range_requests(&server).await, 1);
    assert!(!file.local_path(Some(":TMP:")).exists());
}

#[tokio::test]
async fn wrong_content_range_is_rejected() {
    let server = MockServer::start().await;
    let request = request();
    Mock::given(path(file_path("alpha", &request)))
        .and(header("range", "bytes=0-99"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 100-199/300")
                .set_body_bytes(payload()[100..200].to_vec()),
        )
        .with_priority(1)
        .mount(&server)
        .await;
    serve_source(&server, "alpha", &request).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let (result, failures) = download_collecting_failures(&file, ":TMP:").await;

    assert!(matches!(
        result,
        Err(AppError::Fetch(FetchError::GroupFetchFailed {
            failed: 1,
            total: 1,
            ..
        }))
    ));
    assert_eq!(failures.len(), 1);
    assert!(failures[0].1.contains("Content-Range mismatch"), "{}", failures[0].1);
    assert!(!file.local_path(Some(":TMP:")).exists());
}

#[tokio::test]
async fn failed_group_stops_sibling_retries() {
    let server = MockServer::start().await;
    let request = request();
    let primary = file_path("alpha", &request);
    Mock::given(path(primary.as_str()))
        .and(header("range", "bytes=0-99"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&server)
        .await;
    // Answers after the first group has already failed for good.
    Mock::given(path(primary.as_str()))
        .and(header("range", "bytes=200-"))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(300)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    serve_source(&server, "alpha", &request).await;
    let save_dir = TempDir::new().unwrap();
    let file = forecast(&server, &save_dir).await;

    let (result, failures) = download_collecting_failures(&file, ":(TMP|VGRD):").await;

    match result {
        Err(AppError::Fetch(FetchError::GroupFetchFailed {
            failed,
            total,
            partial,
        })) => {
            assert_eq!((failed, total), (2, 2));
            assert!(partial.is_none());
        }
        other => panic!("expected GroupFetchFailed, got {:?}", other),
    }
    assert_eq!(requests_with_range(&server, "bytes=200-").await, 1);
    assert_eq!(failures.len(), 2);
    assert!(failures
        .iter()
        .any(|(group, error)| *group == 1 && error.contains("abandoned")));

    let destination = file.local_path(Some(":(TMP|VGRD):"));
    assert!(!destination.exists());
    let leftovers = std::fs::read_dir(destination.parent().unwrap()).unwrap().count();
    assert_eq!(leftovers, 0);
}
