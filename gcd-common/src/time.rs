//! Timestamp utilities
//!
//! Legacy snapshots keep dates and times in separate text columns
//! (`Modified` = `YYYY-MM-DD`, `ModTime` = `HH:MM:SS`). The target database
//! stores combined timestamps as `YYYY-MM-DD HH:MM:SS` text.

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Text format of timestamps in the target database
pub const DB_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const LEGACY_DATE_FORMAT: &str = "%Y-%m-%d";
const LEGACY_TIME_FORMAT: &str = "%H:%M:%S";

/// Format a timestamp for storage
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(DB_TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp
///
/// Accepts the `T`-separated ISO form as well, since hand-written config
/// files and SQLite's own `datetime()` disagree on the separator.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    NaiveDateTime::parse_from_str(trimmed, DB_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| Error::InvalidInput(format!("Invalid timestamp '{}': {}", value, e)))
}

/// Parse a legacy `Modified` column value
pub fn parse_legacy_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), LEGACY_DATE_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("Invalid legacy date '{}': {}", value, e)))
}

/// Parse a legacy `ModTime` column value
pub fn parse_legacy_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), LEGACY_TIME_FORMAT)
        .map_err(|e| Error::InvalidInput(format!("Invalid legacy time '{}': {}", value, e)))
}

/// Time of day `seconds` after midnight, `None` past the end of the day
pub fn seconds_after_midnight(seconds: u32) -> Option<NaiveTime> {
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
}
