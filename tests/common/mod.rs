//! Shared fixtures for integration tests: a mock archive served by wiremock

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use grib_fetcher::app::{
    ClientConfig, FetchConfig, GribClient, ModelRegistry, ModelTemplate, Request, SourceCandidate,
};
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, Respond, ResponseTemplate};

/// Index for [`payload`]: three 100-byte messages
pub const INDEX: &str = "\
1:0:d=2024030106:TMP:2 m above ground:anl:
2:100:d=2024030106:UGRD:10 m above ground:anl:
3:200:d=2024030106:VGRD:10 m above ground:anl:
";

/// Three fake GRIB messages of 100 bytes each
pub fn payload() -> Vec<u8> {
    let mut bytes = Vec::with_capacity(300);
    for message in 0..3u8 {
        bytes.extend_from_slice(b"GRIB");
        bytes.extend((0..92u8).map(|i| i.wrapping_mul(3).wrapping_add(message * 50)));
        bytes.extend_from_slice(b"7777");
    }
    bytes
}

/// Serves a fixed body, honouring `Range: bytes=a-b` and `bytes=a-`
pub struct RangeResponder {
    body: Arc<Vec<u8>>,
}

impl RangeResponder {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body: Arc::new(body),
        }
    }
}

impl Respond for RangeResponder {
    fn respond(&self, request: &wiremock::Request) -> ResponseTemplate {
        let total = self.body.len() as u64;
        let Some(range) = request
            .headers
            .get("range")
            .and_then(|value| value.to_str().ok())
        else {
            return ResponseTemplate::new(200).set_body_bytes(self.body.as_ref().clone());
        };

        let Some((start, end)) = parse_range(range, total) else {
            return ResponseTemplate::new(416);
        };
        ResponseTemplate::new(206)
            .insert_header(
                "content-range",
                format!("bytes {}-{}/{}", start, end, total).as_str(),
            )
            .set_body_bytes(self.body[start as usize..=end as usize].to_vec())
    }
}

fn parse_range(header: &str, total: u64) -> Option<(u64, u64)> {
    let span = header.strip_prefix("bytes=")?;
    let (start, end) = span.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = if end.is_empty() {
        total.checked_sub(1)?
    } else {
        end.parse::<u64>().ok()?.min(total.checked_sub(1)?)
    };
    (start <= end).then_some((start, end))
}

/// Archive whose sources are path prefixes on the mock server
pub struct MockArchive {
    base: String,
    sources: Vec<&'static str>,
}

impl MockArchive {
    pub fn new(base: &str, sources: &[&'static str]) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            sources: sources.to_vec(),
        }
    }
}

impl ModelTemplate for MockArchive {
    fn name(&self) -> &str {
        "mock"
    }

    fn description(&self) -> &str {
        "Mock archive served over HTTP"
    }

    fn products(&self) -> &[(&str, &str)] {
        &[("sfc", "surface fields")]
    }

    fn sources(&self, request: &Request, _product: &str) -> Vec<SourceCandidate> {
        self.sources
            .iter()
            .map(|name| SourceCandidate::new(*name, format!("{}{}", self.base, file_path(name, request))))
            .collect()
    }
}

/// Server path of the primary file on one source
pub fn file_path(source: &str, request: &Request) -> String {
    format!(
        "/{}/{}/mock.t{}z.f{:02}.grib2",
        source,
        request.date_stamp(),
        request.hour_stamp(),
        request.fxx()
    )
}

/// Server path of the index next to the primary file
pub fn index_path(source: &str, request: &Request) -> String {
    format!("{}.idx", file_path(source, request))
}

pub fn request() -> Request {
    let time = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap();
    Request::new("mock", time, 0).unwrap()
}

pub fn registry(server: &MockServer, sources: &[&'static str]) -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register("mock", Arc::new(MockArchive::new(&server.uri(), sources)));
    registry
}

pub fn client() -> Arc<GribClient> {
    let config = ClientConfig::default().with_rate_limit(1000);
    Arc::new(GribClient::new(&config).unwrap())
}

/// Fast retries so failure paths finish quickly
pub fn fetch_config(save_dir: &Path) -> FetchConfig {
    FetchConfig::default()
        .with_save_dir(save_dir)
        .with_retries(1, Duration::from_millis(5), Duration::from_millis(20))
}

pub async fn serve_file(server: &MockServer, path_str: &str, body: Vec<u8>) {
    Mock::given(path(path_str))
        .respond_with(RangeResponder::new(body))
        .mount(server)
        .await;
}

/// Primary file and index on one source
pub async fn serve_source(server: &MockServer, source: &str, request: &Request) {
    serve_file(server, &file_path(source, request), payload()).await;
    serve_file(server, &index_path(source, request), INDEX.as_bytes().to_vec()).await;
}

/// GET requests carrying a Range header
pub async fn range_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == "GET" && request.headers.get("range").is_some())
        .count()
}
