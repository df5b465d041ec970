//! Results and progress events produced by the range fetcher

use std::path::PathBuf;

use serde::Serialize;

use crate::app::inventory::ByteRange;

/// Outcome of fetching one subset group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupOutcome {
    pub index: usize,
    pub range: ByteRange,
    /// Offset of the group's first byte in the output file
    pub output_offset: u64,
    /// Bytes written for this group
    pub bytes: u64,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Final error, when the group failed
    pub error: Option<String>,
}

impl GroupOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// What a completed retrieval produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    /// Final artifact path
    pub path: PathBuf,
    /// Source the bytes came from
    pub source: String,
    /// Total bytes in the artifact
    pub bytes_written: u64,
    /// Labels of the included records in file order; empty for whole-file retrievals
    pub records: Vec<String>,
    /// Per-group outcomes in group order
    pub groups: Vec<GroupOutcome>,
    /// True when an existing artifact was kept and nothing was fetched
    pub reused: bool,
}

impl DownloadResult {
    /// Result for an existing artifact left in place
    pub fn reused(path: PathBuf, bytes_written: u64) -> Self {
        Self {
            path,
            source: crate::constants::sources::LOCAL_SOURCE.to_string(),
            bytes_written,
            records: Vec::new(),
            groups: Vec::new(),
            reused: true,
        }
    }

    /// Number of range requests that went out
    pub fn requests(&self) -> u32 {
        self.groups.iter().map(|group| group.attempts).sum()
    }
}

/// Progress events emitted during a retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchProgress {
    Started {
        groups: usize,
        expected_bytes: Option<u64>,
    },
    GroupCompleted {
        group: usize,
        bytes: u64,
    },
    GroupRetry {
        group: usize,
        attempt: u32,
        error: String,
    },
    GroupFailed {
        group: usize,
        error: String,
    },
    Finished {
        bytes: u64,
        path: PathBuf,
    },
}
