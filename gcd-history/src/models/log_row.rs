//! Legacy log rows, before and after alignment
//!
//! A [`LegacyRow`] is read straight from a snapshot: its user, date and time
//! are the ones the old site recorded. The log aligner turns it into a
//! [`LogRow`], whose editor and timestamp belong to the edit that produced
//! the row's state. Every later stage works on `LogRow`s.

use super::payload::LogPayload;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use gcd_common::db::EntityKind;
use gcd_common::Result;

/// One row of a legacy log table (or the appended current state)
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyRow {
    pub id: i64,
    pub entity_id: i64,
    pub user_id: Option<i64>,
    pub modified: Option<NaiveDate>,
    pub mod_time: Option<NaiveTime>,
    pub payload: LogPayload,
}

impl LegacyRow {
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }
}

/// Aligned log row flowing through duplicate marking, time normalization
/// and coalescing
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    /// Auxiliary row id; tie-breaker for equal timestamps
    pub id: i64,
    /// Publisher, series, issue or story id
    pub entity_id: i64,
    pub editor_id: i64,
    pub modified_date: Option<NaiveDate>,
    pub modified_time: Option<NaiveTime>,
    pub is_addition: bool,
    pub is_duplicate: bool,
    /// Set whenever the date portion of the timestamp was inferred
    pub dt_inferred: bool,
    pub payload: LogPayload,
}

impl LogRow {
    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    /// Entity whose changesets this row belongs to: the issue for a story,
    /// the entity itself otherwise
    pub fn owner_id(&self) -> i64 {
        match &self.payload {
            LogPayload::Story(story) => story.issue_id,
            _ => self.entity_id,
        }
    }

    /// Whether the row is a story riding on its issue
    pub fn is_satellite(&self) -> bool {
        matches!(self.payload, LogPayload::Story(_))
    }

    pub fn modified_at(&self) -> Option<NaiveDateTime> {
        match (self.modified_date, self.modified_time) {
            (Some(date), Some(time)) => Some(date.and_time(time)),
            _ => None,
        }
    }

    /// Normalized timestamp; rows that skipped normalization sort first
    pub fn timestamp(&self) -> NaiveDateTime {
        self.modified_at().unwrap_or(NaiveDateTime::MIN)
    }

    pub fn set_modified_at(&mut self, ts: NaiveDateTime) {
        self.modified_date = Some(ts.date());
        self.modified_time = Some(ts.time());
    }

    /// Content key of the row: the entity id plus the kind's duplicate fields
    pub fn fingerprint(&self) -> Result<String> {
        let mut values = vec![serde_json::Value::from(self.entity_id)];
        values.extend(self.payload.duplicate_values()?);
        Ok(serde_json::Value::Array(values).to_string())
    }
}
