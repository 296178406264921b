//! Legacy snapshot access
//!
//! Reads the old site's log tables into [`LegacyRow`]s. The current state of
//! every entity is appended after its log rows, with ids following the
//! table's largest log id, so alignment hands each entity's final state the
//! user and time of its last logged edit.
//!
//! NULL text loads as the empty string, a NULL story sequence number as 9999
//! and a NULL series start year as 0.

use crate::models::{
    IssueFields, LegacyRow, LogPayload, PublisherFields, SeriesFields, StoryFields,
};
use chrono::{NaiveDate, NaiveTime};
use gcd_common::db::{open_snapshot, EntityKind};
use gcd_common::time::{parse_legacy_date, parse_legacy_time};
use gcd_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

const NULL_SEQUENCE_NUMBER: i64 = 9999;

/// Read-only handle on one legacy snapshot
pub struct LegacySnapshot {
    pool: SqlitePool,
}

impl LegacySnapshot {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(open_snapshot(path).await?))
    }

    /// All log rows of one kind followed by the current-state rows
    pub async fn load_rows(&self, kind: EntityKind) -> Result<Vec<LegacyRow>> {
        let descriptor = kind.descriptor();
        let mut unparseable = 0usize;

        let log_sql = format!("SELECT * FROM {} ORDER BY ID", descriptor.original_table);
        let log_rows = sqlx::query(&log_sql).fetch_all(&self.pool).await?;

        let mut rows = Vec::with_capacity(log_rows.len());
        let mut max_id = 0i64;
        for row in &log_rows {
            let id: i64 = row.try_get("ID")?;
            max_id = max_id.max(id);

            let modified = read_date(row, &mut unparseable)?;
            let mod_time = read_time(row, &mut unparseable)?;
            rows.push(LegacyRow {
                id,
                entity_id: row.try_get(descriptor.source_id)?,
                user_id: row.try_get("UserID")?,
                modified,
                mod_time,
                payload: read_payload(kind, row)?,
            });
        }

        let current_sql = format!("SELECT * FROM {} ORDER BY ID", descriptor.current_table);
        let current_rows = sqlx::query(&current_sql).fetch_all(&self.pool).await?;
        let appended = current_rows.len();

        for (offset, row) in current_rows.iter().enumerate() {
            rows.push(LegacyRow {
                id: max_id + 1 + offset as i64,
                entity_id: row.try_get("ID")?,
                user_id: None,
                modified: None,
                mod_time: None,
                payload: read_payload(kind, row)?,
            });
        }

        if unparseable > 0 {
            warn!(
                "{}: {} unparseable date/time values treated as missing",
                descriptor.original_table, unparseable
            );
        }
        info!(
            "Loaded {} rows from {} plus {} current rows from {}",
            log_rows.len(),
            descriptor.original_table,
            appended,
            descriptor.current_table
        );

        Ok(rows)
    }

    /// Legacy indexer ids keyed by username
    pub async fn indexer_ids(&self) -> Result<HashMap<String, i64>> {
        let rows = sqlx::query("SELECT ID, username FROM Indexers")
            .fetch_all(&self.pool)
            .await?;

        let mut ids = HashMap::with_capacity(rows.len());
        for row in rows {
            let username: Option<String> = row.try_get("username")?;
            if let Some(username) = username {
                ids.insert(username, row.try_get("ID")?);
            }
        }
        Ok(ids)
    }

    /// Issues that already had stories in this snapshot
    pub async fn issues_with_stories(&self) -> Result<HashSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT DISTINCT IssueID FROM stories")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }
}

fn read_date(row: &SqliteRow, unparseable: &mut usize) -> Result<Option<NaiveDate>> {
    let value: Option<String> = row.try_get("Modified")?;
    Ok(value.and_then(|v| match parse_legacy_date(&v) {
        Ok(date) => Some(date),
        Err(_) => {
            *unparseable += 1;
            None
        }
    }))
}

fn read_time(row: &SqliteRow, unparseable: &mut usize) -> Result<Option<NaiveTime>> {
    let value: Option<String> = row.try_get("ModTime")?;
    Ok(value.and_then(|v| match parse_legacy_time(&v) {
        Ok(time) => Some(time),
        Err(_) => {
            *unparseable += 1;
            None
        }
    }))
}

fn text(row: &SqliteRow, column: &str) -> Result<String> {
    let value: Option<String> = row.try_get(column)?;
    Ok(value.unwrap_or_default())
}

fn read_payload(kind: EntityKind, row: &SqliteRow) -> Result<LogPayload> {
    let payload = match kind {
        EntityKind::Publisher => LogPayload::Publisher(PublisherFields {
            name: text(row, "PubName")?,
            notes: text(row, "Notes")?,
            year_began: row.try_get("YearBegan")?,
            year_ended: row.try_get("YearEnded")?,
            country_id: row.try_get::<Option<i64>, _>("CountryID")?.unwrap_or(0),
            url: text(row, "Web")?,
        }),
        EntityKind::Series => LogPayload::Series(SeriesFields {
            name: text(row, "Bk_Name")?,
            country_code: text(row, "CounCode")?,
            language_code: text(row, "LangCode")?,
            format: text(row, "Format")?,
            notes: text(row, "Notes")?,
            publisher_id: row.try_get::<Option<i64>, _>("PubID")?.unwrap_or(0),
            publication_notes: text(row, "Pub_Note")?,
            tracking_notes: text(row, "Tracking")?,
            year_began: row.try_get::<Option<i64>, _>("Yr_Began")?.unwrap_or(0),
            year_ended: row.try_get("Yr_Ended")?,
            imprint_id: row.try_get("ImprintID")?,
            country_id: None,
            language_id: None,
        }),
        EntityKind::Issue => LogPayload::Issue(IssueFields {
            number: text(row, "Issue")?,
            volume: row.try_get("VolumeNum")?,
            series_id: row.try_get::<Option<i64>, _>("SeriesID")?.unwrap_or(0),
            publication_date: text(row, "Pub_Date")?,
            key_date: text(row, "Key_Date")?,
            price: text(row, "Price")?,
        }),
        EntityKind::Story => LogPayload::Story(StoryFields {
            issue_id: row.try_get::<Option<i64>, _>("IssueID")?.unwrap_or(0),
            sequence_number: row
                .try_get::<Option<i64>, _>("Seq_No")?
                .unwrap_or(NULL_SEQUENCE_NUMBER),
            title: text(row, "Title")?,
            feature: text(row, "Feature")?,
            type_name: text(row, "Type")?,
            type_id: None,
            page_count: row.try_get("Pg_Cnt")?,
            script: text(row, "Script")?,
            pencils: text(row, "Pencils")?,
            inks: text(row, "Inks")?,
            colors: text(row, "Colors")?,
            letters: text(row, "Letters")?,
            editing: text(row, "Editing")?,
            genre: text(row, "Genre")?,
            characters: text(row, "Char_App")?,
            synopsis: text(row, "Synopsis")?,
            reprint_notes: text(row, "Reprints")?,
            job_number: text(row, "JobNo")?,
            notes: text(row, "Notes")?,
        }),
    };
    Ok(payload)
}
