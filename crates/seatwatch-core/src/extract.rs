//! Field and date extraction over heterogeneous inventory records.
//!
//! Nothing here fails: a value that cannot be interpreted is simply absent,
//! and callers decide what absence means (usually "skip this record").

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::inventory::LicenseRecord;

/// Expiration fields, most specific first.
pub const EXPIRATION_FIELDS: [&str; 7] = [
    "expiration_date",
    "expiry_date",
    "expires",
    "expires_on",
    "expiration",
    "end_date",
    "termination_date",
];

/// Display-name fields, most specific first.
pub const NAME_FIELDS: [&str; 5] = ["name", "license_name", "product", "product_key", "serial"];

/// Keys of the "rich date" objects some backends return instead of a string.
const DATE_OBJECT_KEYS: [&str; 4] = ["datetime", "date", "formatted", "value"];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// Render a JSON scalar as a string. Objects, arrays, booleans and `null` yield `None`.
pub fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a date out of a string or a rich date object, dropping time-of-day.
///
/// Offsets are respected as written: `2024-03-01T23:30:00-05:00` is March 1st.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let value = match value {
        Value::Object(obj) => DATE_OBJECT_KEYS.iter().find_map(|k| obj.get(*k))?,
        other => other,
    };
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    parse_date_str(raw)
}

fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }

    let with_offset = match raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        Some(stripped) => format!("{stripped}+00:00"),
        None => raw.to_string(),
    };
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&with_offset, fmt) {
            return Some(dt.date_naive());
        }
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// First of `keys` present in the record whose value parses as a date.
pub fn field_date(record: &LicenseRecord, keys: &[&str]) -> Option<NaiveDate> {
    keys.iter()
        .filter_map(|k| record.get(k))
        .find_map(parse_date)
}

pub fn expiration_date(record: &LicenseRecord) -> Option<NaiveDate> {
    field_date(record, &EXPIRATION_FIELDS)
}

/// First non-empty name field, else `license-<id>` (or `license-unknown`).
pub fn display_name(record: &LicenseRecord) -> String {
    let found = NAME_FIELDS.iter().find_map(|k| match record.get(k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    });
    found.unwrap_or_else(|| {
        format!(
            "license-{}",
            record.id().unwrap_or_else(|| "unknown".to_string())
        )
    })
}
