//! Database initialization
//!
//! Opens the target database and creates its schema. Every `create_*`
//! function is idempotent (`CREATE TABLE IF NOT EXISTS`), so running the
//! pipeline against an existing target only adds what is missing.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the target database and ensure its schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// In-memory target database with the full schema.
///
/// Limited to one connection: every connection to `sqlite::memory:` is a
/// separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a legacy snapshot read-only
pub async fn open_snapshot(db_path: &Path) -> Result<SqlitePool> {
    if !db_path.exists() {
        return Err(crate::Error::NotFound(format!(
            "Legacy snapshot {}",
            db_path.display()
        )));
    }

    let db_url = format!("sqlite://{}?mode=ro", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect(&db_url)
        .await?;

    info!("Opened legacy snapshot: {}", db_path.display());
    Ok(pool)
}

/// Create every target table
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Reference tables
    create_indexers_table(pool).await?;
    create_countries_table(pool).await?;
    create_languages_table(pool).await?;
    create_story_types_table(pool).await?;
    create_publishers_table(pool).await?;
    create_series_table(pool).await?;
    create_issues_table(pool).await?;
    create_stories_table(pool).await?;

    // Change history
    create_changesets_table(pool).await?;
    create_changeset_comments_table(pool).await?;
    create_publisher_revisions_table(pool).await?;
    create_series_revisions_table(pool).await?;
    create_issue_revisions_table(pool).await?;
    create_story_revisions_table(pool).await?;

    // Working table between prepare and migrate
    create_history_log_table(pool).await?;

    Ok(())
}

async fn create_indexers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS indexers (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_countries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS countries (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_languages_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS languages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_story_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            sort_code INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_publishers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publishers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            country_id INTEGER REFERENCES countries(id),
            is_master INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_series_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS series (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            publisher_id INTEGER NOT NULL REFERENCES publishers(id),
            year_ended INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_issues_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issues (
            id INTEGER PRIMARY KEY,
            number TEXT NOT NULL,
            series_id INTEGER NOT NULL REFERENCES series(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_stories_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stories (
            id INTEGER PRIMARY KEY,
            issue_id INTEGER NOT NULL REFERENCES issues(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_changesets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS changesets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            state INTEGER NOT NULL,
            indexer_id INTEGER NOT NULL REFERENCES indexers(id),
            approver_id INTEGER REFERENCES indexers(id),
            change_type INTEGER NOT NULL,
            migrated INTEGER NOT NULL DEFAULT 0,
            date_inferred INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            modified TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_changesets_created ON changesets(created)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_changeset_comments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS changeset_comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
            commenter_id INTEGER NOT NULL REFERENCES indexers(id),
            text TEXT NOT NULL,
            old_state INTEGER NOT NULL,
            new_state INTEGER NOT NULL,
            created TEXT NOT NULL,
            modified TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_publisher_revisions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publisher_revisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
            publisher_id INTEGER NOT NULL REFERENCES publishers(id),
            name TEXT NOT NULL,
            country_id INTEGER NOT NULL REFERENCES countries(id),
            year_began INTEGER,
            year_ended INTEGER,
            notes TEXT NOT NULL,
            url TEXT NOT NULL,
            is_master INTEGER NOT NULL,
            date_inferred INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            modified TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_series_revisions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS series_revisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
            series_id INTEGER NOT NULL REFERENCES series(id),
            name TEXT NOT NULL,
            format TEXT NOT NULL,
            year_began INTEGER NOT NULL,
            year_ended INTEGER,
            publication_notes TEXT NOT NULL,
            tracking_notes TEXT NOT NULL,
            notes TEXT NOT NULL,
            country_id INTEGER NOT NULL REFERENCES countries(id),
            language_id INTEGER NOT NULL REFERENCES languages(id),
            publisher_id INTEGER NOT NULL REFERENCES publishers(id),
            imprint_id INTEGER REFERENCES publishers(id),
            date_inferred INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            modified TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_issue_revisions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS issue_revisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
            issue_id INTEGER NOT NULL REFERENCES issues(id),
            series_id INTEGER NOT NULL REFERENCES series(id),
            number TEXT NOT NULL,
            volume TEXT NOT NULL DEFAULT '',
            publication_date TEXT NOT NULL DEFAULT '',
            key_date TEXT NOT NULL DEFAULT '',
            price TEXT NOT NULL DEFAULT '',
            no_isbn INTEGER NOT NULL DEFAULT 0,
            no_barcode INTEGER NOT NULL DEFAULT 0,
            date_inferred INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            modified TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_issue_revisions_issue ON issue_revisions(issue_id, created)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_story_revisions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS story_revisions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
            story_id INTEGER NOT NULL REFERENCES stories(id),
            issue_id INTEGER NOT NULL REFERENCES issues(id),
            sequence_number INTEGER NOT NULL,
            title TEXT NOT NULL,
            feature TEXT NOT NULL,
            type_id INTEGER NOT NULL REFERENCES story_types(id),
            page_count INTEGER,
            script TEXT NOT NULL,
            pencils TEXT NOT NULL,
            inks TEXT NOT NULL,
            colors TEXT NOT NULL,
            letters TEXT NOT NULL,
            editing TEXT NOT NULL,
            genre TEXT NOT NULL,
            characters TEXT NOT NULL,
            synopsis TEXT NOT NULL,
            reprint_notes TEXT NOT NULL,
            job_number TEXT NOT NULL,
            notes TEXT NOT NULL,
            date_inferred INTEGER NOT NULL DEFAULT 0,
            created TEXT NOT NULL,
            modified TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_history_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS history_log (
            kind TEXT NOT NULL,
            id INTEGER NOT NULL,
            entity_id INTEGER NOT NULL,
            owner_id INTEGER NOT NULL,
            editor_id INTEGER NOT NULL,
            modified_at TEXT NOT NULL,
            is_addition INTEGER NOT NULL DEFAULT 0,
            is_duplicate INTEGER NOT NULL DEFAULT 0,
            dt_inferred INTEGER NOT NULL DEFAULT 0,
            payload TEXT NOT NULL,
            PRIMARY KEY (kind, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_history_log_entity ON history_log(kind, owner_id, entity_id, modified_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn table_names(pool: &SqlitePool) -> Vec<String> {
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_memory_database_has_full_schema() {
        let pool = init_memory_database().await.unwrap();
        let tables = table_names(&pool).await;

        for expected in [
            "changesets",
            "changeset_comments",
            "history_log",
            "issue_revisions",
            "publisher_revisions",
            "series_revisions",
            "story_revisions",
            "story_types",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing {}", expected);
        }
    }

    #[tokio::test]
    async fn test_create_schema_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();
    }
}
