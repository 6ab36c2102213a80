//! Date/time utilities for bottlemail.
//!
//! All timestamps are UTC. They are stored as fixed-width text so that the
//! database can compare them lexicographically in range filters.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Storage format: `YYYY-MM-DD HH:MM:SS.mmm`.
const DB_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Naive formats accepted for a requested send time, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Format a timestamp for storage.
pub fn to_db(dt: &DateTime<Utc>) -> String {
    dt.format(DB_FORMAT).to_string()
}

/// Parse a stored timestamp.
///
/// Accepts the storage format, SQLite's `datetime('now')` format and RFC 3339.
pub fn from_db(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a user-supplied send time.
///
/// RFC 3339 is preferred; offset-less date-times and bare dates are read as
/// UTC (a bare date means midnight). Returns `None` if nothing matches.
pub fn parse_send_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Format a timestamp the way mail clients display dates
/// (e.g. `Tue, 20 Oct 2026 10:00:00 GMT`).
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
