//! Record selection and contiguous byte-range grouping
//!
//! A search pattern is a case-sensitive regular expression matched against
//! each record's `:variable:level:step:` search field. Matches keep inventory
//! order and are folded into [`SubsetGroup`]s so that adjacent records cost a
//! single HTTP range request.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::app::inventory::{ByteRange, Inventory, InventoryRecord};
use crate::constants::sources;
use crate::errors::{FetchError, FetchResult};

/// A maximal run of selected records with a contiguous byte span
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetGroup {
    /// 0-based position among the selection's groups
    pub index: usize,
    /// Combined span of every record in the group
    pub range: ByteRange,
    /// Message labels of the records in the group
    pub labels: Vec<String>,
}

impl SubsetGroup {
    /// Try to absorb a record that starts at or before the byte after this group
    fn absorb(&mut self, record: &InventoryRecord) -> bool {
        let Some(end) = self.range.end else {
            // An open group already runs to end of file.
            if record.range.start < self.range.start {
                return false;
            }
            self.labels.push(record.label());
            return true;
        };
        if record.range.start > end + 1 {
            return false;
        }
        self.range.end = match record.range.end {
            Some(record_end) => Some(end.max(record_end)),
            None => None,
        };
        self.labels.push(record.label());
        true
    }
}

/// Records matched by a pattern, and the groups needed to fetch them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pattern: Option<String>,
    records: Vec<InventoryRecord>,
    groups: Vec<SubsetGroup>,
}

impl Selection {
    /// Whole-file retrieval: one open range, no inventory needed
    pub fn whole_file() -> Self {
        Self {
            pattern: None,
            records: Vec::new(),
            groups: vec![SubsetGroup {
                index: 0,
                range: ByteRange::full(),
                labels: Vec::new(),
            }],
        }
    }

    /// `None` for whole-file retrieval
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    pub fn groups(&self) -> &[SubsetGroup] {
        &self.groups
    }

    pub fn is_whole_file(&self) -> bool {
        self.pattern.is_none()
    }

    /// True when a pattern matched nothing
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Labels of every selected record, in file order
    pub fn labels(&self) -> Vec<String> {
        self.records.iter().map(InventoryRecord::label).collect()
    }

    /// Sum of group lengths, when no group is open-ended
    pub fn expected_len(&self) -> Option<u64> {
        self.groups.iter().map(|group| group.range.len()).sum()
    }
}

/// Compile a search pattern
pub fn compile(pattern: &str) -> FetchResult<Regex> {
    Regex::new(pattern).map_err(|e| FetchError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

/// Select records whose search field matches `pattern`
///
/// An empty match is returned as an empty selection, not an error.
pub fn select(inventory: &Inventory, pattern: &str) -> FetchResult<Selection> {
    let regex = compile(pattern)?;
    let records: Vec<InventoryRecord> = inventory
        .records()
        .iter()
        .filter(|record| regex.is_match(&record.search))
        .cloned()
        .collect();
    let groups = group(&records);

    Ok(Selection {
        pattern: Some(pattern.to_string()),
        records,
        groups,
    })
}

/// Greedily merge records whose spans touch or overlap
///
/// Records must be in ascending start order, which every inventory guarantees.
pub fn group(records: &[InventoryRecord]) -> Vec<SubsetGroup> {
    let mut groups: Vec<SubsetGroup> = Vec::new();

    for record in records {
        if let Some(current) = groups.last_mut() {
            if current.absorb(record) {
                continue;
            }
        }
        groups.push(SubsetGroup {
            index: groups.len(),
            range: record.range,
            labels: vec![record.label()],
        });
    }
    groups
}

/// Whether a pattern means "everything"
pub fn selects_everything(pattern: Option<&str>) -> bool {
    match pattern {
        None => true,
        Some(p) => p == sources::MATCH_ALL_PATTERN,
    }
}
