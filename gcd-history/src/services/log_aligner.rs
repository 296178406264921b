//! Log Aligner
//!
//! A legacy log row stores a state, but the user and time recorded on it
//! belong to the edit that produced the *next* state. Per entity, in id
//! order, row k takes the user, date and time of row k-1; row 0 becomes
//! the anonymous addition at the dawn of time.

use crate::models::{LegacyRow, LogRow};
use chrono::NaiveDateTime;
use gcd_common::config::AccountAlias;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Counts reported by one alignment pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignReport {
    pub rows: usize,
    pub additions: usize,
    /// Rows whose legacy user was an alias of another login
    pub aliased: usize,
    /// Rows whose legacy user is not a target indexer
    pub unknown_editors: usize,
}

pub struct LogAligner {
    anon_id: i64,
    dawn_of_time: NaiveDateTime,
    /// Legacy user id to the user id it is merged into
    aliases: HashMap<i64, i64>,
    known_editors: HashSet<i64>,
}

impl LogAligner {
    pub fn new(anon_id: i64, dawn_of_time: NaiveDateTime, known_editors: HashSet<i64>) -> Self {
        Self {
            anon_id,
            dawn_of_time,
            aliases: HashMap::new(),
            known_editors,
        }
    }

    /// Resolve configured alias usernames against the snapshot's indexers.
    /// Pairs naming an unknown login are skipped with a warning.
    pub fn with_aliases(mut self, aliases: &[AccountAlias], legacy_ids: &HashMap<String, i64>) -> Self {
        for alias in aliases {
            match (legacy_ids.get(&alias.from), legacy_ids.get(&alias.to)) {
                (Some(from), Some(to)) => {
                    self.aliases.insert(*from, *to);
                }
                _ => warn!(
                    "Account alias {} -> {} not found in legacy indexers, skipped",
                    alias.from, alias.to
                ),
            }
        }
        self
    }

    pub fn align(&self, mut rows: Vec<LegacyRow>) -> (Vec<LogRow>, AlignReport) {
        let mut report = AlignReport {
            rows: rows.len(),
            ..Default::default()
        };
        rows.sort_by_key(|r| (r.entity_id, r.id));

        let mut aligned = Vec::with_capacity(rows.len());
        let mut previous: Option<&LegacyRow> = None;
        let mut previous_editor = self.anon_id;

        for row in &rows {
            let editor = self.normalize_user(row.user_id, &mut report);

            let log_row = match previous.filter(|p| p.entity_id == row.entity_id) {
                Some(prev) => LogRow {
                    id: row.id,
                    entity_id: row.entity_id,
                    editor_id: previous_editor,
                    modified_date: prev.modified,
                    modified_time: prev.mod_time,
                    is_addition: false,
                    is_duplicate: false,
                    dt_inferred: false,
                    payload: row.payload.clone(),
                },
                None => {
                    report.additions += 1;
                    LogRow {
                        id: row.id,
                        entity_id: row.entity_id,
                        editor_id: self.anon_id,
                        modified_date: Some(self.dawn_of_time.date()),
                        modified_time: Some(self.dawn_of_time.time()),
                        is_addition: true,
                        is_duplicate: false,
                        dt_inferred: false,
                        payload: row.payload.clone(),
                    }
                }
            };

            aligned.push(log_row);
            previous = Some(row);
            previous_editor = editor;
        }

        if report.unknown_editors > 0 {
            warn!(
                "{} rows named users missing from the target, attributed to anon",
                report.unknown_editors
            );
        }
        info!(
            "Aligned {} rows: {} additions, {} aliased users",
            report.rows, report.additions, report.aliased
        );

        (aligned, report)
    }

    fn normalize_user(&self, user_id: Option<i64>, report: &mut AlignReport) -> i64 {
        let Some(mut id) = user_id else {
            return self.anon_id;
        };
        if let Some(target) = self.aliases.get(&id) {
            report.aliased += 1;
            id = *target;
        }
        if !self.known_editors.contains(&id) {
            report.unknown_editors += 1;
            return self.anon_id;
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::log_row::test_support::{at, publisher_payload};
    use chrono::{NaiveDate, NaiveTime};

    const ANON: i64 = 1;

    fn legacy(id: i64, entity_id: i64, user: Option<i64>, date: Option<&str>) -> LegacyRow {
        LegacyRow {
            id,
            entity_id,
            user_id: user,
            modified: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            mod_time: date.map(|_| NaiveTime::from_hms_opt(12, 0, 0).unwrap()),
            payload: publisher_payload(&format!("state {}", id)),
        }
    }

    fn aligner() -> LogAligner {
        LogAligner::new(ANON, at("2002-01-01", "00:00:00"), HashSet::from([ANON, 7, 8, 9]))
    }

    #[test]
    fn test_attribution_shifts_forward_per_entity() {
        let rows = vec![
            legacy(3, 10, Some(8), Some("2004-02-02")),
            legacy(1, 10, Some(7), Some("2003-01-01")),
            legacy(2, 20, Some(9), Some("2005-05-05")),
        ];

        let (aligned, report) = aligner().align(rows);

        assert_eq!(aligned.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3, 2]);

        // First row of each entity is the anonymous addition
        assert!(aligned[0].is_addition);
        assert_eq!(aligned[0].editor_id, ANON);
        assert_eq!(aligned[0].modified_at(), Some(at("2002-01-01", "00:00:00")));

        // Second row carries the first row's user and time
        assert!(!aligned[1].is_addition);
        assert_eq!(aligned[1].editor_id, 7);
        assert_eq!(aligned[1].modified_at(), Some(at("2003-01-01", "12:00:00")));

        // Entity 20 does not inherit from entity 10
        assert!(aligned[2].is_addition);
        assert_eq!(aligned[2].editor_id, ANON);
        assert_eq!(report.additions, 2);
    }

    #[test]
    fn test_null_and_unknown_users_become_anon() {
        let rows = vec![
            legacy(1, 10, None, None),
            legacy(2, 10, Some(4242), None),
            legacy(3, 10, Some(7), None),
        ];

        let (aligned, report) = aligner().align(rows);

        assert_eq!(aligned[1].editor_id, ANON);
        assert_eq!(aligned[2].editor_id, ANON);
        assert_eq!(aligned[2].modified_date, None);
        assert_eq!(report.unknown_editors, 1);
    }

    #[test]
    fn test_aliases_merge_logins() {
        let legacy_ids = HashMap::from([
            ("rayb".to_string(), 7),
            ("RaySB".to_string(), 55),
        ]);
        let aliases = vec![
            AccountAlias { from: "RaySB".to_string(), to: "rayb".to_string() },
            AccountAlias { from: "ghost".to_string(), to: "rayb".to_string() },
        ];
        let aligner = aligner().with_aliases(&aliases, &legacy_ids);

        let (aligned, report) = aligner.align(vec![
            legacy(1, 10, Some(55), Some("2003-01-01")),
            legacy(2, 10, Some(7), Some("2003-02-01")),
        ]);

        assert_eq!(aligned[1].editor_id, 7);
        assert_eq!(report.aliased, 1);
    }
}
