//! Time Normalizer
//!
//! Gives every row a complete, per-entity unique timestamp.
//!
//! **Per-date strategy** (publishers, series, issues):
//! 1. Undated rows get the dawn-of-time date if they are additions (or for
//!    every row of a kind normalized in early mode), the default date
//!    otherwise. Their `dt_inferred` flag is set.
//! 2. Configured overrides replace dates/times of known anomalous rows.
//! 3. Rows still lacking a time, in `(entity, id)` order, get 00:00:01,
//!    00:00:02, ... restarting for every `(entity, date)` and skipping
//!    times another row of the entity already holds on that date.
//!
//! **Sequential strategy** (stories): after overrides, non-duplicate rows
//! in `(entity, id)` order keep their own date and time; an undated row gets
//! the dawn of time when it is the entity's first row, otherwise one second
//! after the previous row.

use crate::models::LogRow;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use gcd_common::config::{MigrationConfig, TimeOverride};
use gcd_common::db::EntityKind;
use gcd_common::time::seconds_after_midnight;
use gcd_common::{Error, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeStrategy {
    PerDate,
    Sequential,
}

impl TimeStrategy {
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Story => TimeStrategy::Sequential,
            _ => TimeStrategy::PerDate,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub dates_inferred: usize,
    pub times_assigned: usize,
    pub overridden: usize,
}

pub struct TimeNormalizer {
    dawn_of_time: NaiveDateTime,
    default_date: NaiveDate,
    overrides: Vec<TimeOverride>,
}

impl TimeNormalizer {
    pub fn new(dawn_of_time: NaiveDateTime, default_date: NaiveDate) -> Self {
        Self {
            dawn_of_time,
            default_date,
            overrides: Vec::new(),
        }
    }

    /// Normalizer for one kind, holding that kind's configured overrides
    pub fn from_config(config: &MigrationConfig, kind: EntityKind) -> Self {
        Self::new(config.timeline.dawn_of_time, config.timeline.default_date)
            .with_overrides(config.overrides_for(kind))
    }

    pub fn with_overrides(mut self, overrides: Vec<TimeOverride>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn normalize(&self, kind: EntityKind, rows: &mut [LogRow]) -> Result<NormalizeReport> {
        let mut report = NormalizeReport::default();
        if rows.is_empty() {
            info!("No {} rows to normalize", kind);
            return Ok(report);
        }

        let strategy = TimeStrategy::for_kind(kind);
        if strategy == TimeStrategy::PerDate {
            self.fill_dates(kind, rows, &mut report);
        }
        self.apply_overrides(kind, rows, &mut report);

        match strategy {
            TimeStrategy::PerDate => self.assign_per_date(rows, &mut report)?,
            TimeStrategy::Sequential => self.assign_sequential(rows, &mut report),
        }

        info!(
            "Normalized {} {} rows: {} dates inferred, {} times assigned, {} overridden",
            rows.len(),
            kind,
            report.dates_inferred,
            report.times_assigned,
            report.overridden
        );
        Ok(report)
    }

    fn fill_dates(&self, kind: EntityKind, rows: &mut [LogRow], report: &mut NormalizeReport) {
        for row in rows.iter_mut().filter(|r| r.modified_date.is_none()) {
            let date = if kind.early_dates() || row.is_addition {
                self.dawn_of_time.date()
            } else {
                self.default_date
            };
            row.modified_date = Some(date);
            row.dt_inferred = true;
            report.dates_inferred += 1;
        }
    }

    fn apply_overrides(&self, kind: EntityKind, rows: &mut [LogRow], report: &mut NormalizeReport) {
        let by_row: HashMap<i64, &TimeOverride> = self
            .overrides
            .iter()
            .filter(|o| o.kind == kind)
            .flat_map(|o| o.row_ids.iter().map(move |id| (*id, o)))
            .collect();
        if by_row.is_empty() {
            return;
        }

        for row in rows.iter_mut() {
            let Some(entry) = by_row.get(&row.id) else {
                continue;
            };
            if let Some(date) = entry.date {
                row.modified_date = Some(date);
            }
            if let Some(time) = entry.time {
                row.modified_time = Some(time);
            }
            if entry.inferred {
                row.dt_inferred = true;
            }
            debug!("Override applied to {} row {}", kind, row.id);
            report.overridden += 1;
        }
    }

    fn assign_per_date(&self, rows: &mut [LogRow], report: &mut NormalizeReport) -> Result<()> {
        let mut occupied: HashSet<(i64, NaiveDate, NaiveTime)> = rows
            .iter()
            .filter_map(|r| Some((r.entity_id, r.modified_date?, r.modified_time?)))
            .collect();

        let mut pending: Vec<usize> = (0..rows.len())
            .filter(|&i| rows[i].modified_time.is_none())
            .collect();
        pending.sort_by_key(|&i| (rows[i].entity_id, rows[i].id));

        let mut next_second: HashMap<(i64, NaiveDate), u32> = HashMap::new();
        for i in pending {
            let entity_id = rows[i].entity_id;
            let date = rows[i].modified_date.unwrap_or(self.default_date);
            let second = next_second.entry((entity_id, date)).or_insert(1);

            let time = loop {
                let candidate = seconds_after_midnight(*second).ok_or_else(|| {
                    Error::Internal(format!("No free time left for entity {} on {}", entity_id, date))
                })?;
                *second += 1;
                if occupied.insert((entity_id, date, candidate)) {
                    break candidate;
                }
            };

            rows[i].modified_date = Some(date);
            rows[i].modified_time = Some(time);
            report.times_assigned += 1;
        }

        Ok(())
    }

    fn assign_sequential(&self, rows: &mut [LogRow], report: &mut NormalizeReport) {
        let one_second = Duration::seconds(1);
        let mut occupied: HashSet<(i64, NaiveDateTime)> = rows
            .iter()
            .filter(|r| !r.is_duplicate)
            .filter_map(|r| {
                let date = r.modified_date?;
                Some((r.entity_id, date.and_time(r.modified_time.unwrap_or(NaiveTime::MIN))))
            })
            .collect();

        let mut order: Vec<usize> = (0..rows.len()).filter(|&i| !rows[i].is_duplicate).collect();
        order.sort_by_key(|&i| (rows[i].entity_id, rows[i].id));

        let mut last: Option<(i64, NaiveDateTime)> = None;
        for i in order {
            let row = &mut rows[i];
            let ts = match row.modified_date {
                Some(date) => date.and_time(row.modified_time.unwrap_or(NaiveTime::MIN)),
                None => {
                    row.dt_inferred = true;
                    report.dates_inferred += 1;
                    report.times_assigned += 1;
                    match last {
                        Some((entity_id, last_ts)) if entity_id == row.entity_id => {
                            let mut candidate = last_ts + one_second;
                            while !occupied.insert((row.entity_id, candidate)) {
                                candidate += one_second;
                            }
                            candidate
                        }
                        _ => self.dawn_of_time,
                    }
                }
            };
            row.set_modified_at(ts);
            last = Some((row.entity_id, ts));
        }

        // Duplicates are never migrated; they only need a stored timestamp
        for row in rows.iter_mut().filter(|r| r.is_duplicate) {
            let ts = match row.modified_date {
                Some(date) => date.and_time(row.modified_time.unwrap_or(NaiveTime::MIN)),
                None => {
                    row.dt_inferred = true;
                    self.dawn_of_time
                }
            };
            row.set_modified_at(ts);
        }
    }
}
