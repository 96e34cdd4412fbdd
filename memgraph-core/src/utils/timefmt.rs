// src/utils/timefmt.rs
//! Fixed UTC stamp format used in node frontmatter and the index file.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// `2025-01-31T09:15:00Z`
pub const STAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

// Tried in order after the fixed form and RFC 3339. Naive values are taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

pub fn format_stamp(ts: DateTime<Utc>) -> String {
    ts.format(STAMP_FORMAT).to_string()
}

pub fn now_stamp() -> String {
    format_stamp(Utc::now())
}

/// Parse a stamp leniently: the fixed `...Z` form first, then RFC 3339 with an
/// offset, then a handful of naive date-time shapes, then a bare date.
pub fn parse_stamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, STAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Rewrite any recognizable date-time into the fixed format. Text that does not
/// parse is returned unchanged.
pub fn normalize_stamp(raw: &str) -> String {
    match parse_stamp(raw) {
        Some(ts) => format_stamp(ts),
        None => raw.trim().to_string(),
    }
}
