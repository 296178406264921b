//! Test Helper Utilities
//!
//! Builds a small target database and legacy snapshots on disk:
//! - publisher 1 "Marvel" with its series 10
//! - issues 100 and 101, stories 1000 and 1001 on 100, story 1002 on 101
//! - indexers anon (1), rayb (7) and kim (8)

#![allow(dead_code)]

use gcd_common::db::init_memory_database;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};

pub const ANON: i64 = 1;
pub const RAY: i64 = 7;
pub const KIM: i64 = 8;

pub const PUBLISHER: i64 = 1;
pub const SERIES: i64 = 10;
pub const ISSUE: i64 = 100;
pub const STORYLESS_ISSUE: i64 = 101;

/// In-memory target with reference tables seeded
pub async fn create_target() -> SqlitePool {
    let pool = init_memory_database().await.unwrap();

    let statements = [
        "INSERT INTO indexers (id, username) VALUES (1, 'anon'), (7, 'rayb'), (8, 'kim')",
        "INSERT INTO countries (id, code, name) VALUES (1, 'us', 'United States'), (75, 'gb', 'United Kingdom'), (99, 'xx', '(unknown)')",
        "INSERT INTO languages (code, name) VALUES ('en', 'English')",
        "INSERT INTO story_types (name, sort_code) VALUES ('comic story', 19)",
        "INSERT INTO publishers (id, name, country_id, is_master) VALUES (1, 'Marvel', 1, 1), (2, 'unknown', 99, 1), (3, 'Marvel Imprint', 1, 0)",
        "INSERT INTO series (id, name, publisher_id, year_ended) VALUES (10, 'Fantastic Four', 1, 1972)",
        "INSERT INTO issues (id, number, series_id) VALUES (100, '1', 10), (101, '2', 10)",
        "INSERT INTO stories (id, issue_id) VALUES (1000, 100), (1001, 100), (1002, 101)",
    ];
    for sql in statements {
        sqlx::query(sql).execute(&pool).await.unwrap();
    }

    pool
}

const PUBLISHER_COLUMNS: &str =
    "PubName TEXT, Notes TEXT, YearBegan INTEGER, YearEnded INTEGER, CountryID INTEGER, Web TEXT";
const SERIES_COLUMNS: &str = "Bk_Name TEXT, CounCode TEXT, LangCode TEXT, Format TEXT, Notes TEXT, \
     PubID INTEGER, Pub_Note TEXT, Tracking TEXT, Yr_Began INTEGER, Yr_Ended INTEGER, ImprintID INTEGER";
const ISSUE_COLUMNS: &str =
    "Issue TEXT, VolumeNum INTEGER, SeriesID INTEGER, Pub_Date TEXT, Key_Date TEXT, Price TEXT";
const STORY_COLUMNS: &str = "IssueID INTEGER, Seq_No INTEGER, Title TEXT, Feature TEXT, Type TEXT, \
     Pg_Cnt INTEGER, Script TEXT, Pencils TEXT, Inks TEXT, Colors TEXT, Letters TEXT, Editing TEXT, \
     Genre TEXT, Char_App TEXT, Synopsis TEXT, Reprints TEXT, JobNo TEXT, Notes TEXT";

/// Legacy snapshot file with empty log, current-state and indexer tables
pub async fn create_legacy_snapshot(dir: &Path, name: &str) -> (PathBuf, SqlitePool) {
    let path = dir.join(name);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await
        .unwrap();

    let tables = [
        ("LogPublishers", "PublisherID", "publishers", PUBLISHER_COLUMNS),
        ("LogSeries", "SeriesID", "series", SERIES_COLUMNS),
        ("LogIssues", "IssueID", "issues", ISSUE_COLUMNS),
        ("LogStories", "StoryID", "stories", STORY_COLUMNS),
    ];
    for (log_table, source_id, current_table, columns) in tables {
        let log_sql = format!(
            "CREATE TABLE {} (ID INTEGER PRIMARY KEY, {} INTEGER, UserID INTEGER, Modified TEXT, ModTime TEXT, {})",
            log_table, source_id, columns
        );
        sqlx::query(&log_sql).execute(&pool).await.unwrap();

        // Story columns already name IssueID
        let current_sql = format!("CREATE TABLE {} (ID INTEGER PRIMARY KEY, {})", current_table, columns);
        sqlx::query(&current_sql).execute(&pool).await.unwrap();
    }

    sqlx::query("CREATE TABLE Indexers (ID INTEGER PRIMARY KEY, username TEXT)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO Indexers (ID, username) VALUES (1, 'anon'), (7, 'rayb'), (8, 'kim'), (55, 'RaySB')")
        .execute(&pool)
        .await
        .unwrap();

    (path, pool)
}

/// Log row of publisher `publisher_id`
pub async fn log_publisher(
    pool: &SqlitePool,
    id: i64,
    publisher_id: i64,
    user: Option<i64>,
    modified: Option<(&str, &str)>,
    name: &str,
) {
    sqlx::query(
        "INSERT INTO LogPublishers (ID, PublisherID, UserID, Modified, ModTime, PubName, CountryID, YearBegan) \
         VALUES (?, ?, ?, ?, ?, ?, 1, 1939)",
    )
    .bind(id)
    .bind(publisher_id)
    .bind(user)
    .bind(modified.map(|(date, _)| date))
    .bind(modified.map(|(_, time)| time))
    .bind(name)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn current_publisher(pool: &SqlitePool, id: i64, name: &str) {
    sqlx::query("INSERT INTO publishers (ID, PubName, CountryID, YearBegan) VALUES (?, ?, 1, 1939)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn log_issue(
    pool: &SqlitePool,
    id: i64,
    issue_id: i64,
    user: Option<i64>,
    modified: Option<(&str, &str)>,
    number: &str,
) {
    sqlx::query(
        "INSERT INTO LogIssues (ID, IssueID, UserID, Modified, ModTime, Issue, SeriesID) VALUES (?, ?, ?, ?, ?, ?, 10)",
    )
    .bind(id)
    .bind(issue_id)
    .bind(user)
    .bind(modified.map(|(date, _)| date))
    .bind(modified.map(|(_, time)| time))
    .bind(number)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn current_issue(pool: &SqlitePool, id: i64, number: &str) {
    sqlx::query("INSERT INTO issues (ID, Issue, SeriesID) VALUES (?, ?, 10)")
        .bind(id)
        .bind(number)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn log_story(
    pool: &SqlitePool,
    id: i64,
    story_id: i64,
    issue_id: i64,
    user: Option<i64>,
    modified: Option<(&str, &str)>,
    title: &str,
) {
    sqlx::query(
        "INSERT INTO LogStories (ID, StoryID, UserID, Modified, ModTime, IssueID, Seq_No, Title, Type, Pg_Cnt) \
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, 'story', 8)",
    )
    .bind(id)
    .bind(story_id)
    .bind(user)
    .bind(modified.map(|(date, _)| date))
    .bind(modified.map(|(_, time)| time))
    .bind(issue_id)
    .bind(title)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn current_story(pool: &SqlitePool, id: i64, issue_id: i64, title: &str) {
    sqlx::query("INSERT INTO stories (ID, IssueID, Seq_No, Title, Type, Pg_Cnt) VALUES (?, ?, 1, ?, 'story', 8)")
        .bind(id)
        .bind(issue_id)
        .bind(title)
        .execute(pool)
        .await
        .unwrap();
}

/// Snapshot with the history used by most pipeline tests:
///
/// - publisher 1: created anonymously, renamed by rayb, then by kim
/// - issue 100 and story 1000: edited by rayb on consecutive days
/// - story 1002 on issue 101, which has no issue log: edited by kim
pub async fn seed_history(pool: &SqlitePool) {
    log_publisher(pool, 1, PUBLISHER, Some(RAY), Some(("2004-03-01", "10:00:00")), "Marvel Comics").await;
    log_publisher(pool, 2, PUBLISHER, Some(KIM), Some(("2004-03-20", "12:00:00")), "Marvel").await;
    current_publisher(pool, PUBLISHER, "Marvel Worldwide").await;

    log_issue(pool, 1, ISSUE, Some(RAY), Some(("2005-01-10", "09:00:00")), "1").await;
    current_issue(pool, ISSUE, "1 (special)").await;

    log_story(pool, 1, 1000, ISSUE, Some(RAY), Some(("2005-01-11", "10:00:00")), "Origin").await;
    current_story(pool, 1000, ISSUE, "The Origin").await;

    log_story(pool, 2, 1002, STORYLESS_ISSUE, Some(KIM), Some(("2005-02-01", "08:00:00")), "Backup").await;
    current_story(pool, 1002, STORYLESS_ISSUE, "Backup Feature").await;
}

pub async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    sqlx::query_scalar(sql).fetch_one(pool).await.unwrap()
}
