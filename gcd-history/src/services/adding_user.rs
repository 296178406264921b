//! Adding-user attribution for issues indexed after the bulk import
//!
//! The old site logged a story's first state anonymously, even when an
//! indexer added the issue and its stories later on. For such issues the
//! first changeset is credited to the first non-anonymous editor of the
//! issue's own log.
//!
//! An issue qualifies when it has story rows, its stories are absent from
//! the earliest snapshot, and the target holds no revision of it from
//! before the earliest data date.

use crate::models::LogRow;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use std::collections::{HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone)]
pub struct AddingUserAttribution {
    anon_id: i64,
    /// Anonymous rows before this instant belong to the addition
    cutoff: NaiveDateTime,
    /// Issue id to the user credited with adding it
    adding_users: HashMap<i64, i64>,
}

impl AddingUserAttribution {
    pub fn new(anon_id: i64, dawn_of_time: NaiveDateTime, adding_users: HashMap<i64, i64>) -> Self {
        let cutoff = (dawn_of_time.date() + Duration::days(1)).and_time(NaiveTime::MIN);
        Self {
            anon_id,
            cutoff,
            adding_users,
        }
    }

    /// Find adding users among issue and story rows.
    ///
    /// `established` lists issues that already existed when the old site's
    /// own data begins; they keep the anonymous addition.
    pub fn build(
        rows: &[LogRow],
        established: &HashSet<i64>,
        anon_id: i64,
        dawn_of_time: NaiveDateTime,
    ) -> Self {
        let with_stories: HashSet<i64> = rows
            .iter()
            .filter(|r| r.is_satellite())
            .map(LogRow::owner_id)
            .collect();

        let mut issue_rows: Vec<&LogRow> = rows
            .iter()
            .filter(|r| !r.is_satellite() && r.editor_id != anon_id)
            .filter(|r| with_stories.contains(&r.entity_id) && !established.contains(&r.entity_id))
            .collect();
        issue_rows.sort_by_key(|r| (r.timestamp(), r.id));

        let mut adding_users = HashMap::new();
        for row in issue_rows {
            adding_users.entry(row.entity_id).or_insert(row.editor_id);
        }

        info!("Adding users found for {} issues", adding_users.len());
        Self::new(anon_id, dawn_of_time, adding_users)
    }

    pub fn adding_user(&self, issue_id: i64) -> Option<i64> {
        self.adding_users.get(&issue_id).copied()
    }

    /// Whether the row is an anonymous dawn-day row of an attributed issue
    pub fn leads(&self, row: &LogRow) -> bool {
        row.editor_id == self.anon_id
            && row.timestamp() < self.cutoff
            && self.adding_users.contains_key(&row.owner_id())
    }

    pub fn len(&self) -> usize {
        self.adding_users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adding_users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::log_row::test_support::*;

    const ANON: i64 = 1;

    fn dawn() -> NaiveDateTime {
        at("2002-01-01", "00:00:00")
    }

    #[test]
    fn test_first_named_editor_adds_the_issue() {
        let rows = vec![
            row(1, 42, ANON, dawn(), issue_payload(3, "1")),
            row(3, 42, 9, at("2006-05-01", "10:00:00"), issue_payload(3, "1")),
            row(2, 42, 7, at("2006-04-01", "10:00:00"), issue_payload(3, "1")),
            row(4, 500, ANON, dawn(), story_payload(42, "a")),
        ];

        let attribution = AddingUserAttribution::build(&rows, &HashSet::new(), ANON, dawn());

        assert_eq!(attribution.adding_user(42), Some(7));
        assert!(attribution.leads(&rows[3]));
        assert!(!attribution.leads(&rows[2]));
    }

    #[test]
    fn test_established_and_storyless_issues_are_skipped() {
        let rows = vec![
            row(1, 42, 7, at("2006-04-01", "10:00:00"), issue_payload(3, "1")),
            row(2, 500, ANON, dawn(), story_payload(42, "a")),
            row(3, 43, 7, at("2006-04-01", "10:00:00"), issue_payload(3, "2")),
        ];

        let attribution = AddingUserAttribution::build(&rows, &HashSet::from([42]), ANON, dawn());

        assert!(attribution.is_empty());
    }

    #[test]
    fn test_only_dawn_day_rows_lead() {
        let attribution = AddingUserAttribution::new(ANON, dawn(), HashMap::from([(42, 7)]));

        assert!(attribution.leads(&row(1, 500, ANON, at("2002-01-01", "23:59:59"), story_payload(42, "a"))));
        assert!(!attribution.leads(&row(2, 500, ANON, at("2002-01-02", "00:00:00"), story_payload(42, "a"))));
        assert!(!attribution.leads(&row(3, 501, ANON, dawn(), story_payload(43, "b"))));
    }
}
