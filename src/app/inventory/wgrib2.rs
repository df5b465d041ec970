//! wgrib2-style index parsing
//!
//! Lines look like `12:4035226:d=2024030106:TMP:2 m above ground:6 hour fcst:`.
//! Only the start offset is stated; a record ends one byte before the next
//! larger start offset and the final record runs to end of file. Because a
//! single bad line would shift every derived end offset, any parse failure is
//! fatal.

use chrono::NaiveDateTime;

use super::{search_field, ByteRange, IndexGrammar, Inventory, InventoryRecord};
use crate::errors::{IndexError, IndexResult};

/// Fields parsed from one line before end offsets are known
struct Line<'a> {
    sequence: u32,
    submessage: Option<u32>,
    start: u64,
    reference_time: Option<NaiveDateTime>,
    descriptors: Vec<&'a str>,
}

/// Parse wgrib2 index text
pub fn parse(text: &str, location: &str) -> IndexResult<Inventory> {
    let mut lines: Vec<Line<'_>> = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        let line = parse_line(trimmed).map_err(|reason| corrupt(number + 1, raw, reason))?;

        if let Some(previous) = lines.last() {
            if line.start < previous.start {
                return Err(corrupt(
                    number + 1,
                    raw,
                    format!(
                        "byte offset {} precedes previous offset {}",
                        line.start, previous.start
                    ),
                ));
            }
            if line.sequence < previous.sequence
                || (line.sequence == previous.sequence && line.submessage <= previous.submessage)
            {
                return Err(corrupt(number + 1, raw, "message numbers out of order"));
            }
        }
        lines.push(line);
    }

    let ends = end_offsets(&lines);
    let records = lines
        .into_iter()
        .zip(ends)
        .map(|(line, end)| InventoryRecord {
            sequence: line.sequence,
            submessage: line.submessage,
            range: ByteRange {
                start: line.start,
                end,
            },
            reference_time: line.reference_time,
            variable: line.descriptors.first().copied().unwrap_or_default().to_string(),
            level: line.descriptors.get(1).copied().unwrap_or_default().to_string(),
            step: line.descriptors.get(2).copied().unwrap_or_default().to_string(),
            search: search_field(line.descriptors.iter().copied()),
        })
        .collect();

    Inventory::from_records(IndexGrammar::Wgrib2, location, records, 0)
}

fn parse_line(line: &str) -> Result<Line<'_>, String> {
    let fields: Vec<&str> = line.split(':').collect();
    if fields.len() < 3 {
        return Err(format!(
            "expected at least 3 colon-separated fields, found {}",
            fields.len()
        ));
    }

    let (sequence, submessage) = parse_message_number(fields[0])?;
    let start = fields[1]
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid byte offset {:?}", fields[1]))?;

    let reference_time = match fields[2].trim().strip_prefix("d=") {
        Some(stamp) => Some(parse_reference_time(stamp)?),
        None => None,
    };

    Ok(Line {
        sequence,
        submessage,
        start,
        reference_time,
        descriptors: fields[3..].to_vec(),
    })
}

/// `53` or `53.2`
fn parse_message_number(field: &str) -> Result<(u32, Option<u32>), String> {
    let field = field.trim();
    let invalid = || format!("invalid message number {:?}", field);
    match field.split_once('.') {
        Some((message, sub)) => {
            let message = message.parse::<u32>().map_err(|_| invalid())?;
            let sub = sub.parse::<u32>().map_err(|_| invalid())?;
            Ok((message, Some(sub)))
        }
        None => Ok((field.parse::<u32>().map_err(|_| invalid())?, None)),
    }
}

/// `YYYYMMDDHH`, optionally with minutes
fn parse_reference_time(stamp: &str) -> Result<NaiveDateTime, String> {
    let padded = match stamp.len() {
        10 => format!("{}00", stamp),
        12 => stamp.to_string(),
        _ => return Err(format!("invalid reference date {:?}", stamp)),
    };
    NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M")
        .map_err(|_| format!("invalid reference date {:?}", stamp))
}

/// Each record ends one byte before the next strictly larger start
///
/// Sub-messages share a start offset and therefore share the span of the
/// message that contains them.
fn end_offsets(lines: &[Line<'_>]) -> Vec<Option<u64>> {
    let mut ends = vec![None; lines.len()];
    let mut boundary: Option<u64> = None;
    let mut later_start: Option<u64> = None;

    for (index, line) in lines.iter().enumerate().rev() {
        if let Some(next) = later_start {
            if next > line.start {
                boundary = Some(next);
            }
        }
        ends[index] = boundary.map(|next| next - 1);
        later_start = Some(line.start);
    }
    ends
}

fn corrupt(line: usize, content: &str, reason: impl Into<String>) -> IndexError {
    IndexError::Corrupt {
        line,
        content: content.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HRRR_IDX: &str = "\
1:0:d=2024030106:REFC:entire atmosphere:6 hour fcst:
2:215646:d=2024030106:RETOP:cloud top:6 hour fcst:
3:332124:d=2024030106:TMP:2 m above ground:6 hour fcst:
4:1064301:d=2024030106:UGRD:10 m above ground:6 hour fcst:
";

    #[test]
    fn test_parse_derives_end_offsets() {
        let inventory = parse(HRRR_IDX, "hrrr.idx").unwrap();
        let records = inventory.records();

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].range, ByteRange::new(0, 215645));
        assert_eq!(records[1].range, ByteRange::new(215646, 332123));
        assert_eq!(records[2].range, ByteRange::new(332124, 1064300));
        assert_eq!(records[3].range, ByteRange::open(1064301));
        assert_eq!(inventory.skipped_lines(), 0);
    }

    #[test]
    fn test_parse_descriptors_and_search_field() {
        let inventory = parse(HRRR_IDX, "hrrr.idx").unwrap();
        let tmp = &inventory.records()[2];

        assert_eq!(tmp.sequence, 3);
        assert_eq!(tmp.variable, "TMP");
        assert_eq!(tmp.level, "2 m above ground");
        assert_eq!(tmp.step, "6 hour fcst");
        assert_eq!(tmp.search, ":TMP:2 m above ground:6 hour fcst:");
        assert_eq!(
            tmp.reference_time.map(|t| t.format("%Y%m%d%H").to_string()),
            Some("2024030106".to_string())
        );
    }

    #[test]
    fn test_parse_line_without_trailing_colon_and_extra_fields() {
        let text = "\
1:0:d=2024030100:APCP:surface:0-6 hour acc fcst:ens mean
2:500:d=2024030100:APCP:surface:0-6 hour acc fcst:prob >2.54:prob fcst 0/31
";
        let inventory = parse(text, "gefs.idx").unwrap();
        assert_eq!(
            inventory.records()[0].search,
            ":APCP:surface:0-6 hour acc fcst:ens mean:"
        );
        assert_eq!(
            inventory.records()[1].search,
            ":APCP:surface:0-6 hour acc fcst:prob >2.54:prob fcst 0/31:"
        );
    }

    #[test]
    fn test_submessages_share_message_span() {
        let text = "\
52:100:d=2024030100:VGRD:80 m above ground:anl:
53.1:200:d=2024030100:UGRD:10 m above ground:anl:
53.2:200:d=2024030100:VGRD:10 m above ground:anl:
54:400:d=2024030100:TMP:surface:anl:
";
        let inventory = parse(text, "hrrr.idx").unwrap();
        let records = inventory.records();

        assert_eq!(records[1].label(), "53.1");
        assert_eq!(records[1].range, ByteRange::new(200, 399));
        assert_eq!(records[2].range, ByteRange::new(200, 399));
        assert_eq!(inventory.record("53.2").map(|r| r.variable.as_str()), Some("VGRD"));
    }

    /// Any malformed line must abort the parse rather than shift offsets.
    #[test]
    fn test_corrupt_line_is_fatal() {
        let text = "\
1:0:d=2024030106:REFC:entire atmosphere:6 hour fcst:
2:not-a-number:d=2024030106:TMP:2 m above ground:6 hour fcst:
3:300:d=2024030106:UGRD:10 m above ground:6 hour fcst:
";
        match parse(text, "bad.idx") {
            Err(IndexError::Corrupt { line, reason, .. }) => {
                assert_eq!(line, 2);
                assert!(reason.contains("byte offset"));
            }
            other => panic!("expected Corrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_descending_offsets_are_corrupt() {
        let text = "1:500:d=2024030106:A:x:y:\n2:100:d=2024030106:B:x:y:\n";
        assert!(matches!(
            parse(text, "bad.idx"),
            Err(IndexError::Corrupt { line: 2, .. })
        ));
    }

    #[test]
    fn test_short_line_and_bad_date_are_corrupt() {
        assert!(matches!(
            parse("1:0\n", "bad.idx"),
            Err(IndexError::Corrupt { line: 1, .. })
        ));
        assert!(matches!(
            parse("1:0:d=20240301:TMP:surface:anl:\n", "bad.idx"),
            Err(IndexError::Corrupt { line: 1, .. })
        ));
    }

    #[test]
    fn test_blank_index_is_empty() {
        assert!(matches!(
            parse("\n\n", "empty.idx"),
            Err(IndexError::Empty { .. })
        ));
    }
}
