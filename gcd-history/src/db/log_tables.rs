//! `history_log` working table
//!
//! `prepare` replaces the rows of one kind; `migrate` reads them back.

use crate::models::{LogPayload, LogRow};
use gcd_common::db::EntityKind;
use gcd_common::time::{format_timestamp, parse_timestamp};
use gcd_common::{Error, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Remove every prepared row of one kind
pub async fn clear_log_rows(conn: &mut SqliteConnection, kind: EntityKind) -> Result<u64> {
    let result = sqlx::query("DELETE FROM history_log WHERE kind = ?")
        .bind(kind.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Store normalized rows
pub async fn save_log_rows(conn: &mut SqliteConnection, rows: &[LogRow]) -> Result<()> {
    for row in rows {
        let modified_at = row.modified_at().ok_or_else(|| {
            Error::Internal(format!("{} row {} has no timestamp", row.kind(), row.id))
        })?;

        sqlx::query(
            r#"
            INSERT INTO history_log (
                kind, id, entity_id, owner_id, editor_id, modified_at,
                is_addition, is_duplicate, dt_inferred, payload
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(row.kind().as_str())
        .bind(row.id)
        .bind(row.entity_id)
        .bind(row.owner_id())
        .bind(row.editor_id)
        .bind(format_timestamp(modified_at))
        .bind(row.is_addition)
        .bind(row.is_duplicate)
        .bind(row.dt_inferred)
        .bind(row.payload.to_json()?)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Load non-duplicate rows of one kind, ordered by owner, time and id.
///
/// `from_owner` skips owners with a smaller id.
pub async fn load_log_rows(
    pool: &SqlitePool,
    kind: EntityKind,
    from_owner: Option<i64>,
) -> Result<Vec<LogRow>> {
    let rows = sqlx::query(
        r#"
        SELECT id, entity_id, editor_id, modified_at, is_addition, is_duplicate,
               dt_inferred, payload
        FROM history_log
        WHERE kind = ? AND is_duplicate = 0 AND owner_id >= ?
        ORDER BY owner_id, modified_at, id
        "#,
    )
    .bind(kind.as_str())
    .bind(from_owner.unwrap_or(i64::MIN))
    .fetch_all(pool)
    .await?;

    let mut log_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let modified_at = parse_timestamp(row.get::<String, _>("modified_at").as_str())?;
        let payload: String = row.get("payload");
        log_rows.push(LogRow {
            id: row.get("id"),
            entity_id: row.get("entity_id"),
            editor_id: row.get("editor_id"),
            modified_date: Some(modified_at.date()),
            modified_time: Some(modified_at.time()),
            is_addition: row.get("is_addition"),
            is_duplicate: row.get("is_duplicate"),
            dt_inferred: row.get("dt_inferred"),
            payload: LogPayload::from_json(kind, &payload)?,
        });
    }

    Ok(log_rows)
}

/// Number of prepared rows of one kind, duplicates included
pub async fn count_log_rows(pool: &SqlitePool, kind: EntityKind) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM history_log WHERE kind = ?")
        .bind(kind.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
