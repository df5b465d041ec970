//! Index file parsing into a structured inventory
//!
//! Remote archives publish a small companion index next to every GRIB2 file.
//! Two index grammars exist in the wild and both normalize into the same
//! [`InventoryRecord`] schema:
//!
//! - `wgrib2`: colon-delimited text, one line per message, byte start only.
//!   End offsets are derived from the following line, so any unparseable
//!   line aborts the parse.
//! - `eccodes`: one JSON object per line with explicit offset and length.
//!   Lines are independent, so bad lines are skipped and counted.
//!
//! Every record carries a synthesized search field shaped like
//! `:variable:level:step:` so a single regular expression contract works for
//! both grammars.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{IndexError, IndexResult};

pub mod eccodes;
pub mod wgrib2;

/// Index grammar used by a model's sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexGrammar {
    /// Colon-delimited `seq:start:d=YYYYMMDDHH:VAR:level:step:` lines
    Wgrib2,
    /// One JSON record per line with `_offset` and `_length`
    Eccodes,
}

impl IndexGrammar {
    /// Parse index text with this grammar
    ///
    /// `location` is only used for error messages and logging.
    pub fn parse(&self, text: &str, location: &str) -> IndexResult<Inventory> {
        let inventory = match self {
            IndexGrammar::Wgrib2 => wgrib2::parse(text, location)?,
            IndexGrammar::Eccodes => eccodes::parse(text, location)?,
        };

        if inventory.skipped_lines() > 0 {
            warn!(
                "Skipped {} unparseable index lines in {}",
                inventory.skipped_lines(),
                location
            );
        }
        Ok(inventory)
    }
}

impl fmt::Display for IndexGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexGrammar::Wgrib2 => f.write_str("wgrib2"),
            IndexGrammar::Eccodes => f.write_str("eccodes"),
        }
    }
}

/// Absolute byte span inside a primary file, inclusive on both ends
///
/// An open end means "through end of file".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn open(start: u64) -> Self {
        Self { start, end: None }
    }

    /// Whole file, `bytes=0-`
    pub fn full() -> Self {
        Self::open(0)
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Number of bytes covered, when the end is known
    pub fn len(&self) -> Option<u64> {
        self.end.map(|end| end.saturating_sub(self.start).saturating_add(1))
    }

    /// HTTP `Range` header value
    pub fn to_header(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{}", self.start, end),
            None => write!(f, "{}-", self.start),
        }
    }
}

/// One addressable GRIB message described by an index line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// 1-based message number in on-disk order
    pub sequence: u32,
    /// Sub-message number for messages packing several fields (`53.2`)
    pub submessage: Option<u32>,
    /// Byte span of the message in the primary file
    pub range: ByteRange,
    /// Model initialization time, when the index states one
    pub reference_time: Option<NaiveDateTime>,
    /// Variable short name, e.g. `TMP` or `2t`
    pub variable: String,
    /// Level or layer descriptor
    pub level: String,
    /// Forecast step descriptor
    pub step: String,
    /// `:variable:level:step:...:` text matched by search patterns
    pub search: String,
}

impl InventoryRecord {
    /// Message label as printed by wgrib2, e.g. `53` or `53.2`
    pub fn label(&self) -> String {
        match self.submessage {
            Some(sub) => format!("{}.{}", self.sequence, sub),
            None => self.sequence.to_string(),
        }
    }
}

/// Build the search field from descriptor fields, skipping empty ones
pub(crate) fn search_field<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut search = String::from(":");
    for field in fields {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        search.push_str(field);
        search.push(':');
    }
    search
}

/// Parsed, immutable index of a primary file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    grammar: IndexGrammar,
    location: String,
    records: Vec<InventoryRecord>,
    skipped_lines: usize,
}

impl Inventory {
    /// Assemble an inventory from records already in ascending byte order
    pub(crate) fn from_records(
        grammar: IndexGrammar,
        location: &str,
        records: Vec<InventoryRecord>,
        skipped_lines: usize,
    ) -> IndexResult<Self> {
        if records.is_empty() {
            return Err(IndexError::Empty {
                location: location.to_string(),
            });
        }
        Ok(Self {
            grammar,
            location: location.to_string(),
            records,
            skipped_lines,
        })
    }

    pub fn grammar(&self) -> IndexGrammar {
        self.grammar
    }

    /// Where the index text came from
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Lines dropped by a tolerant grammar
    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Find a record by its message label (`12` or `53.2`)
    pub fn record(&self, label: &str) -> Option<&InventoryRecord> {
        self.records.iter().find(|record| record.label() == label)
    }
}
