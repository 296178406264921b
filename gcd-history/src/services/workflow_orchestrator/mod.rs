//! Migration workflow orchestrator
//!
//! Drives the pipeline through its two phases:
//!
//! - **PREPARE** (`phase_prepare`): per kind, load the legacy log, fix
//!   values, align attribution, mark duplicates and normalize times, then
//!   replace that kind's rows in the `history_log` working table.
//! - **MIGRATE** (`phase_migrate`): per kind, read the prepared rows back,
//!   coalesce them into groups and write one changeset per group.
//!
//! Every kind's writes are committed in one transaction. A failed kind
//! rolls back on its own; kinds committed before it stay.

use gcd_common::db::EntityKind;
use gcd_common::MigrationConfig;
use sqlx::SqlitePool;

mod phase_migrate;
mod phase_prepare;
pub mod statistics;

pub use statistics::{MigrateStats, MigrationStatistics, PrepareStats};

/// Which legacy snapshot the prepared rows came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SnapshotMode {
    /// First snapshot of the old site; migrated without adding-user attribution
    Earliest,
    /// Last snapshot; issues added later are credited to their adding user
    #[default]
    Latest,
}

/// Migration workflow service
pub struct MigrationOrchestrator {
    db: SqlitePool,
    config: MigrationConfig,
    statistics: MigrationStatistics,
}

impl MigrationOrchestrator {
    /// Create an orchestrator writing to the target pool `db`
    pub fn new(db: SqlitePool, config: MigrationConfig) -> Self {
        Self {
            db,
            config,
            statistics: MigrationStatistics::new(),
        }
    }

    pub fn statistics(&self) -> &MigrationStatistics {
        &self.statistics
    }
}

/// Requested kinds in processing order, without repeats.
/// An empty request means every kind.
fn ordered_kinds(requested: &[EntityKind]) -> Vec<EntityKind> {
    EntityKind::ALL
        .into_iter()
        .filter(|kind| requested.is_empty() || requested.contains(kind))
        .collect()
}

/// Kinds that produce changesets. Stories ride on issues.
fn changeset_kinds(requested: &[EntityKind]) -> Vec<EntityKind> {
    let mut kinds: Vec<EntityKind> = ordered_kinds(requested)
        .into_iter()
        .map(|kind| match kind {
            EntityKind::Story => EntityKind::Issue,
            other => other,
        })
        .collect();
    kinds.dedup();
    kinds
}
