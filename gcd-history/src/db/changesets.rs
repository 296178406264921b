//! Changeset and revision persistence
//!
//! Drafts carry their own timestamp. The changeset, its comment and every
//! revision are written with `created = modified = draft.created`.

use chrono::NaiveDateTime;
use gcd_common::db::{ChangesetDraft, Revision};
use gcd_common::time::format_timestamp;
use gcd_common::Result;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashSet;

/// Write one changeset with its comment and revisions; returns the changeset id
pub async fn insert_changeset(conn: &mut SqliteConnection, draft: &ChangesetDraft) -> Result<i64> {
    let created = format_timestamp(draft.created);

    let result = sqlx::query(
        r#"
        INSERT INTO changesets (
            state, indexer_id, approver_id, change_type, migrated, date_inferred,
            created, modified
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(draft.state.code())
    .bind(draft.indexer_id)
    .bind(draft.approver_id)
    .bind(draft.change_type.code())
    .bind(draft.migrated)
    .bind(draft.date_inferred)
    .bind(&created)
    .bind(&created)
    .execute(&mut *conn)
    .await?;
    let changeset_id = result.last_insert_rowid();

    sqlx::query(
        r#"
        INSERT INTO changeset_comments (
            changeset_id, commenter_id, text, old_state, new_state, created, modified
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(changeset_id)
    .bind(draft.comment.commenter_id)
    .bind(&draft.comment.text)
    .bind(draft.comment.old_state.code())
    .bind(draft.comment.new_state.code())
    .bind(&created)
    .bind(&created)
    .execute(&mut *conn)
    .await?;

    for revision in &draft.revisions {
        insert_revision(conn, changeset_id, revision, draft.date_inferred, &created).await?;
    }

    Ok(changeset_id)
}

async fn insert_revision(
    conn: &mut SqliteConnection,
    changeset_id: i64,
    revision: &Revision,
    date_inferred: bool,
    created: &str,
) -> Result<()> {
    match revision {
        Revision::Publisher(r) => {
            sqlx::query(
                r#"
                INSERT INTO publisher_revisions (
                    changeset_id, publisher_id, name, country_id, year_began, year_ended,
                    notes, url, is_master, date_inferred, created, modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(changeset_id)
            .bind(r.publisher_id)
            .bind(&r.name)
            .bind(r.country_id)
            .bind(r.year_began)
            .bind(r.year_ended)
            .bind(&r.notes)
            .bind(&r.url)
            .bind(r.is_master)
            .bind(date_inferred)
            .bind(created)
            .bind(created)
            .execute(&mut *conn)
            .await?;
        }
        Revision::Series(r) => {
            sqlx::query(
                r#"
                INSERT INTO series_revisions (
                    changeset_id, series_id, name, format, year_began, year_ended,
                    publication_notes, tracking_notes, notes, country_id, language_id,
                    publisher_id, imprint_id, date_inferred, created, modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(changeset_id)
            .bind(r.series_id)
            .bind(&r.name)
            .bind(&r.format)
            .bind(r.year_began)
            .bind(r.year_ended)
            .bind(&r.publication_notes)
            .bind(&r.tracking_notes)
            .bind(&r.notes)
            .bind(r.country_id)
            .bind(r.language_id)
            .bind(r.publisher_id)
            .bind(r.imprint_id)
            .bind(date_inferred)
            .bind(created)
            .bind(created)
            .execute(&mut *conn)
            .await?;
        }
        Revision::Issue(r) => {
            sqlx::query(
                r#"
                INSERT INTO issue_revisions (
                    changeset_id, issue_id, series_id, number, volume, publication_date,
                    key_date, price, no_isbn, no_barcode, date_inferred, created, modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(changeset_id)
            .bind(r.issue_id)
            .bind(r.series_id)
            .bind(&r.number)
            .bind(&r.volume)
            .bind(&r.publication_date)
            .bind(&r.key_date)
            .bind(&r.price)
            .bind(r.no_isbn)
            .bind(r.no_barcode)
            .bind(date_inferred)
            .bind(created)
            .bind(created)
            .execute(&mut *conn)
            .await?;
        }
        Revision::Story(r) => {
            sqlx::query(
                r#"
                INSERT INTO story_revisions (
                    changeset_id, story_id, issue_id, sequence_number, title, feature,
                    type_id, page_count, script, pencils, inks, colors, letters, editing,
                    genre, characters, synopsis, reprint_notes, job_number, notes,
                    date_inferred, created, modified
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(changeset_id)
            .bind(r.story_id)
            .bind(r.issue_id)
            .bind(r.sequence_number)
            .bind(&r.title)
            .bind(&r.feature)
            .bind(r.type_id)
            .bind(r.page_count)
            .bind(&r.script)
            .bind(&r.pencils)
            .bind(&r.inks)
            .bind(&r.colors)
            .bind(&r.letters)
            .bind(&r.editing)
            .bind(&r.genre)
            .bind(&r.characters)
            .bind(&r.synopsis)
            .bind(&r.reprint_notes)
            .bind(&r.job_number)
            .bind(&r.notes)
            .bind(date_inferred)
            .bind(created)
            .bind(created)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

/// Issues that already have a revision created before `before`
pub async fn issues_revised_before(pool: &SqlitePool, before: NaiveDateTime) -> Result<HashSet<i64>> {
    let ids: Vec<i64> =
        sqlx::query_scalar("SELECT DISTINCT issue_id FROM issue_revisions WHERE created < ?")
            .bind(format_timestamp(before))
            .fetch_all(pool)
            .await?;
    Ok(ids.into_iter().collect())
}

/// Number of migrated changesets of one change type
pub async fn count_changesets(pool: &SqlitePool, change_type: i64) -> Result<i64> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM changesets WHERE migrated = 1 AND change_type = ?",
    )
    .bind(change_type)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::log_row::test_support::at;
    use gcd_common::db::{
        init_memory_database, ChangeType, ChangesetState, CommentDraft, IssueRevision,
    };

    async fn seed(pool: &SqlitePool) {
        for sql in [
            "INSERT INTO indexers (id, username) VALUES (1, 'anon'), (7, 'ed')",
            "INSERT INTO countries (id, code, name) VALUES (1, 'us', 'United States')",
            "INSERT INTO publishers (id, name, country_id) VALUES (1, 'Pub', 1)",
            "INSERT INTO series (id, name, publisher_id) VALUES (1, 'S', 1)",
            "INSERT INTO issues (id, number, series_id) VALUES (42, '1', 1)",
        ] {
            sqlx::query(sql).execute(pool).await.unwrap();
        }
    }

    fn draft(created: NaiveDateTime) -> ChangesetDraft {
        ChangesetDraft {
            indexer_id: 7,
            approver_id: 1,
            state: ChangesetState::Approved,
            change_type: ChangeType::Issue,
            created,
            migrated: true,
            date_inferred: true,
            comment: CommentDraft {
                commenter_id: 7,
                text: "migrated".to_string(),
                old_state: ChangesetState::Approved,
                new_state: ChangesetState::Approved,
            },
            revisions: vec![Revision::Issue(IssueRevision {
                issue_id: 42,
                series_id: 1,
                number: "1".to_string(),
                volume: String::new(),
                publication_date: String::new(),
                key_date: String::new(),
                price: String::new(),
                no_isbn: false,
                no_barcode: false,
            })],
        }
    }

    #[tokio::test]
    async fn test_timestamps_are_caller_supplied() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool).await;

        let created = at("2003-05-06", "07:08:09");
        let mut conn = pool.acquire().await.unwrap();
        let id = insert_changeset(&mut conn, &draft(created)).await.unwrap();
        drop(conn);

        let (cs_created, cs_modified): (String, String) =
            sqlx::query_as("SELECT created, modified FROM changesets WHERE id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap();
        let comment_created: String =
            sqlx::query_scalar("SELECT created FROM changeset_comments WHERE changeset_id = ?")
                .bind(id)
                .fetch_one(&pool)
                .await
                .unwrap();
        let (rev_created, rev_inferred): (String, bool) = sqlx::query_as(
            "SELECT created, date_inferred FROM issue_revisions WHERE changeset_id = ?",
        )
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(cs_created, "2003-05-06 07:08:09");
        assert_eq!(cs_modified, cs_created);
        assert_eq!(comment_created, cs_created);
        assert_eq!(rev_created, cs_created);
        assert!(rev_inferred);
        assert_eq!(count_changesets(&pool, 2).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_issues_revised_before_cutoff() {
        let pool = init_memory_database().await.unwrap();
        seed(&pool).await;

        let mut conn = pool.acquire().await.unwrap();
        insert_changeset(&mut conn, &draft(at("2003-01-01", "00:00:00"))).await.unwrap();
        drop(conn);

        let early = issues_revised_before(&pool, at("2004-09-01", "00:00:00")).await.unwrap();
        let none = issues_revised_before(&pool, at("2002-09-01", "00:00:00")).await.unwrap();
        assert!(early.contains(&42));
        assert!(none.is_empty());
    }
}
