//! Reference data from the target database
//!
//! Loaded once per command. Lookups that the value fixer and the revision
//! emitter need are served from memory.

use gcd_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};
use tracing::info;

pub const UNKNOWN_COUNTRY_NAME: &str = "(unknown)";
pub const UNKNOWN_PUBLISHER_NAME: &str = "unknown";
pub const UNDETERMINED_LANGUAGE_CODE: &str = "und";
pub const UNKNOWN_STORY_TYPE_NAME: &str = "(unknown)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesRef {
    pub publisher_id: i64,
    pub year_ended: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
    pub number: String,
    pub series_id: i64,
}

/// In-memory view of the target's reference tables
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub anon_id: i64,
    pub indexers: HashSet<i64>,
    /// Publisher id to `is_master`
    pub publishers: HashMap<i64, bool>,
    pub series: HashMap<i64, SeriesRef>,
    pub issues: HashMap<i64, IssueRef>,
    /// Story id to issue id
    pub stories: HashMap<i64, i64>,
    pub country_ids: HashSet<i64>,
    pub countries_by_code: HashMap<String, i64>,
    pub languages_by_code: HashMap<String, i64>,
    pub story_types_by_name: HashMap<String, i64>,
    pub unknown_country_id: Option<i64>,
    pub unknown_publisher_id: Option<i64>,
    pub undetermined_language_id: i64,
    pub unknown_story_type_id: i64,
}

impl ReferenceData {
    /// Load reference tables, creating the `und` language and the
    /// `(unknown)` story type when missing
    pub async fn load(pool: &SqlitePool, anon_username: &str) -> Result<Self> {
        let anon_id: i64 = sqlx::query_scalar("SELECT id FROM indexers WHERE username = ?")
            .bind(anon_username)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Indexer '{}'", anon_username)))?;

        let undetermined_language_id = ensure_undetermined_language(pool).await?;
        let unknown_story_type_id = ensure_unknown_story_type(pool).await?;

        let mut data = ReferenceData {
            anon_id,
            undetermined_language_id,
            unknown_story_type_id,
            ..Default::default()
        };

        let indexer_ids: Vec<i64> = sqlx::query_scalar("SELECT id FROM indexers")
            .fetch_all(pool)
            .await?;
        data.indexers = indexer_ids.into_iter().collect();

        for row in sqlx::query("SELECT id, name, is_master FROM publishers")
            .fetch_all(pool)
            .await?
        {
            let id: i64 = row.get("id");
            let name: String = row.get("name");
            if name == UNKNOWN_PUBLISHER_NAME {
                data.unknown_publisher_id = Some(id);
            }
            data.publishers.insert(id, row.get::<i64, _>("is_master") != 0);
        }

        for row in sqlx::query("SELECT id, publisher_id, year_ended FROM series")
            .fetch_all(pool)
            .await?
        {
            data.series.insert(
                row.get("id"),
                SeriesRef {
                    publisher_id: row.get("publisher_id"),
                    year_ended: row.get("year_ended"),
                },
            );
        }

        for row in sqlx::query("SELECT id, number, series_id FROM issues")
            .fetch_all(pool)
            .await?
        {
            data.issues.insert(
                row.get("id"),
                IssueRef {
                    number: row.get("number"),
                    series_id: row.get("series_id"),
                },
            );
        }

        for row in sqlx::query("SELECT id, issue_id FROM stories")
            .fetch_all(pool)
            .await?
        {
            data.stories.insert(row.get("id"), row.get("issue_id"));
        }

        for row in sqlx::query("SELECT id, code, name FROM countries")
            .fetch_all(pool)
            .await?
        {
            let id: i64 = row.get("id");
            let name: String = row.get("name");
            if name == UNKNOWN_COUNTRY_NAME {
                data.unknown_country_id = Some(id);
            }
            data.country_ids.insert(id);
            data.countries_by_code.insert(row.get("code"), id);
        }

        for row in sqlx::query("SELECT id, code FROM languages")
            .fetch_all(pool)
            .await?
        {
            data.languages_by_code.insert(row.get("code"), row.get("id"));
        }

        for row in sqlx::query("SELECT id, name FROM story_types")
            .fetch_all(pool)
            .await?
        {
            data.story_types_by_name.insert(row.get("name"), row.get("id"));
        }

        info!(
            "Reference data: {} publishers, {} series, {} issues, {} stories",
            data.publishers.len(),
            data.series.len(),
            data.issues.len(),
            data.stories.len()
        );

        Ok(data)
    }

    pub fn unknown_country(&self) -> Result<i64> {
        self.unknown_country_id
            .ok_or_else(|| Error::NotFound(format!("Country '{}'", UNKNOWN_COUNTRY_NAME)))
    }

    pub fn unknown_publisher(&self) -> Result<i64> {
        self.unknown_publisher_id
            .ok_or_else(|| Error::NotFound(format!("Publisher '{}'", UNKNOWN_PUBLISHER_NAME)))
    }

    pub fn series(&self, id: i64) -> Result<&SeriesRef> {
        self.series
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Series {}", id)))
    }

    pub fn issue(&self, id: i64) -> Result<&IssueRef> {
        self.issues
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Issue {}", id)))
    }
}

async fn ensure_undetermined_language(pool: &SqlitePool) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM languages WHERE code = ?")
        .bind(UNDETERMINED_LANGUAGE_CODE)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO languages (code, name) VALUES (?, '(undetermined)')")
        .bind(UNDETERMINED_LANGUAGE_CODE)
        .execute(pool)
        .await?;
    info!("Created language '{}'", UNDETERMINED_LANGUAGE_CODE);
    Ok(result.last_insert_rowid())
}

async fn ensure_unknown_story_type(pool: &SqlitePool) -> Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM story_types WHERE name = ?")
        .bind(UNKNOWN_STORY_TYPE_NAME)
        .fetch_optional(pool)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO story_types (name, sort_code) VALUES (?, 100)")
        .bind(UNKNOWN_STORY_TYPE_NAME)
        .execute(pool)
        .await?;
    let id = result.last_insert_rowid();

    // Sorts with its own id
    sqlx::query("UPDATE story_types SET sort_code = id WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    info!("Created story type '{}'", UNKNOWN_STORY_TYPE_NAME);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcd_common::db::init_memory_database;

    #[tokio::test]
    async fn test_missing_anon_is_not_found() {
        let pool = init_memory_database().await.unwrap();
        let err = ReferenceData::load(&pool, "anon").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_creates_fallback_rows_once() {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("INSERT INTO indexers (id, username) VALUES (1, 'anon')")
            .execute(&pool)
            .await
            .unwrap();

        let first = ReferenceData::load(&pool, "anon").await.unwrap();
        let second = ReferenceData::load(&pool, "anon").await.unwrap();

        assert_eq!(first.anon_id, 1);
        assert_eq!(first.undetermined_language_id, second.undetermined_language_id);
        assert_eq!(first.unknown_story_type_id, second.unknown_story_type_id);

        let sort_code: i64 = sqlx::query_scalar("SELECT sort_code FROM story_types WHERE name = '(unknown)'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(sort_code, first.unknown_story_type_id);

        assert!(first.unknown_country().is_err());
        assert!(first.unknown_publisher().is_err());
    }
}
