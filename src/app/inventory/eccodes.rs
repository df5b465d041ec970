//! ecCodes-style index parsing
//!
//! Each line is a self-contained JSON object, e.g.
//! `{"domain": "g", "date": "20240301", "time": "0000", "expver": "0001",
//! "class": "od", "type": "fc", "stream": "oper", "step": "6", "levtype": "sfc",
//! "param": "2t", "_offset": 0, "_length": 609069}`.
//! Offsets and lengths are explicit, so a bad line is skipped without
//! affecting any other record.

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{search_field, ByteRange, IndexGrammar, Inventory, InventoryRecord};
use crate::errors::IndexResult;

/// Keys contributing to the search field after variable, level and step
const SEARCH_KEYS: &[&str] = &["number", "domain", "expver", "class", "type", "stream"];

/// Parse ecCodes JSON-lines index text
pub fn parse(text: &str, location: &str) -> IndexResult<Inventory> {
    let mut records = Vec::new();
    let mut skipped = 0;

    for (number, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_line(trimmed) {
            Ok(record) => records.push(record),
            Err(reason) => {
                debug!("Skipping index line {} of {}: {}", number + 1, location, reason);
                skipped += 1;
            }
        }
    }

    // Lines need not be in file order; sequence numbers follow byte order.
    records.sort_by_key(|record| record.range.start);
    let mut unique: Vec<InventoryRecord> = Vec::with_capacity(records.len());
    for record in records {
        match unique.last() {
            Some(kept) if kept.range.start == record.range.start => {
                warn!(
                    "Dropping index record {:?} in {}: offset {} already used by {:?}",
                    record.variable, location, record.range.start, kept.variable
                );
                skipped += 1;
            }
            _ => unique.push(record),
        }
    }
    let mut records = unique;

    for (index, record) in records.iter_mut().enumerate() {
        record.sequence = (index + 1) as u32;
    }

    Inventory::from_records(IndexGrammar::Eccodes, location, records, skipped)
}

fn parse_line(line: &str) -> Result<InventoryRecord, String> {
    let value: Value = serde_json::from_str(line).map_err(|e| format!("invalid JSON: {}", e))?;
    let object = value
        .as_object()
        .ok_or_else(|| "expected a JSON object".to_string())?;

    let offset = integer(object, "_offset")?;
    let length = integer(object, "_length")?;
    if length == 0 {
        return Err("zero-length record".to_string());
    }
    let end = offset
        .checked_add(length - 1)
        .ok_or_else(|| "_offset + _length overflows".to_string())?;

    let variable = text(object, "param").ok_or_else(|| "missing param".to_string())?;
    let level = text(object, "levelist").unwrap_or_default();
    let level_type = text(object, "levtype").unwrap_or_default();
    let step = text(object, "step").unwrap_or_default();

    let mut fields = vec![variable.clone(), level.clone(), level_type.clone(), step.clone()];
    fields.extend(SEARCH_KEYS.iter().filter_map(|key| text(object, key)));

    let level = match (level.is_empty(), level_type.is_empty()) {
        (false, false) => format!("{} {}", level, level_type),
        (false, true) => level,
        _ => level_type,
    };

    Ok(InventoryRecord {
        sequence: 0,
        submessage: None,
        range: ByteRange::new(offset, end),
        reference_time: reference_time(object),
        variable,
        level,
        step,
        search: search_field(fields.iter().map(String::as_str)),
    })
}

fn integer(object: &Map<String, Value>, key: &str) -> Result<u64, String> {
    match object.get(key) {
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| format!("{} is not a byte count", key)),
        Some(Value::String(s)) => s
            .parse::<u64>()
            .map_err(|_| format!("{} is not a byte count", key)),
        _ => Err(format!("missing {}", key)),
    }
}

/// String or numeric field rendered as text
fn text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn reference_time(object: &Map<String, Value>) -> Option<NaiveDateTime> {
    let date = text(object, "date")?;
    let time = text(object, "time").unwrap_or_else(|| "0000".to_string());
    NaiveDateTime::parse_from_str(&format!("{}{:0>4}", date, time), "%Y%m%d%H%M").ok()
}
