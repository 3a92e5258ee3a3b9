use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::models::{value_text, Field, LeadRecord};

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

/// Coerce a loosely-typed sheet row into a [`LeadRecord`]. Never fails:
/// anything that is not an object becomes an empty record.
pub fn normalize(value: Value) -> LeadRecord {
    let Value::Object(map) = value else {
        return LeadRecord::default();
    };

    let mut record = LeadRecord::default();
    for (key, value) in map {
        match Field::from_key(&key) {
            Some(field) => {
                record.sent.insert(field);
                let slot = record.field_mut(field);
                // The canonical key wins over an alias when both are sent.
                if slot.is_none() || key == field.key() {
                    *slot = value_text(&value).map(|text| text.into_owned());
                }
            }
            None => {
                record.extra.insert(key, value);
            }
        }
    }

    record.submitted_at = record.submit_at.as_deref().and_then(parse_timestamp);
    record
}

pub fn normalize_all(values: Vec<Value>) -> Vec<LeadRecord> {
    let records: Vec<LeadRecord> = values.into_iter().map(normalize).collect();
    let undated = records.iter().filter(|r| r.submitted_at.is_none()).count();
    tracing::debug!(
        records = records.len(),
        undated,
        "normalized lead records"
    );
    records
}

/// Parse a submit timestamp, keeping the wall-clock time it was written in.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(stamp);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
