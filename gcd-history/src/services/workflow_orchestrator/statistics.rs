//! Migration run statistics
//!
//! Collected per kind as the phases run, logged as a summary at the end.

use chrono::{DateTime, Utc};
use gcd_common::db::EntityKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// **PREPARE Phase Statistics**
///
/// Display: "N loaded, M dropped, K duplicates, S stored"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareStats {
    pub loaded: usize,
    pub dropped: usize,
    pub additions: usize,
    pub duplicates: usize,
    pub dates_inferred: usize,
    /// Rows of an earlier prepare replaced by this one
    pub replaced: u64,
    pub stored: usize,
}

impl PrepareStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} loaded, {} dropped, {} duplicates, {} stored",
            self.loaded, self.dropped, self.duplicates, self.stored
        )
    }
}

/// **MIGRATE Phase Statistics**
///
/// Display: "N rows into M changesets (R revisions)"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateStats {
    pub rows: usize,
    pub changesets: usize,
    pub revisions: usize,
    pub additions: usize,
    pub attributed: usize,
}

impl MigrateStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} rows into {} changesets ({} revisions)",
            self.rows, self.changesets, self.revisions
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStatistics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub prepare: BTreeMap<EntityKind, PrepareStats>,
    pub migrate: BTreeMap<EntityKind, MigrateStats>,
}

impl MigrationStatistics {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            prepare: BTreeMap::new(),
            migrate: BTreeMap::new(),
        }
    }

    /// One line per phase and kind
    pub fn summary_lines(&self) -> Vec<String> {
        let prepare = self
            .prepare
            .iter()
            .map(|(kind, stats)| format!("prepare {}: {}", kind, stats.display_string()));
        let migrate = self
            .migrate
            .iter()
            .map(|(kind, stats)| format!("migrate {}: {}", kind, stats.display_string()));
        prepare.chain(migrate).collect()
    }
}

impl Default for MigrationStatistics {
    fn default() -> Self {
        Self::new()
    }
}
