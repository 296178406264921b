//! Phase 2: MIGRATE
//!
//! `history_log` → changesets, comments and revisions.
//!
//! Nothing marks rows as migrated: running this phase twice writes every
//! changeset twice. Use `from_entity` to resume a failed kind instead.

use super::{changeset_kinds, MigrateStats, MigrationOrchestrator, SnapshotMode};
use crate::db::changesets::{count_changesets, insert_changeset, issues_revised_before};
use crate::db::log_tables::load_log_rows;
use crate::db::{LegacySnapshot, ReferenceData};
use crate::models::LogRow;
use crate::services::{
    sort_for_coalescing, AddingUserAttribution, ChangeCoalescer, CoalescedGroup, RevisionEmitter,
};
use gcd_common::db::EntityKind;
use gcd_common::{Error, Result};
use sqlx::SqliteConnection;
use tracing::{debug, info};

/// Rows between progress messages
const PROGRESS_INTERVAL: usize = 1000;

impl MigrationOrchestrator {
    /// Write changesets for `kinds` (all kinds when empty), skipping owners
    /// below `from_entity`
    pub async fn migrate(
        &mut self,
        mode: SnapshotMode,
        kinds: &[EntityKind],
        from_entity: Option<i64>,
    ) -> Result<()> {
        let reference = ReferenceData::load(&self.db, &self.config.accounts.anon_username).await?;
        let emitter = RevisionEmitter::new(&reference, &self.config.timeline);

        for kind in changeset_kinds(kinds) {
            let mut rows = load_log_rows(&self.db, kind, from_entity).await?;
            if kind == EntityKind::Issue {
                rows.extend(load_log_rows(&self.db, EntityKind::Story, from_entity).await?);
            }
            let total = rows.len();
            info!("MIGRATE {} ({:?} snapshot): {} rows", kind, mode, total);

            let attribution = match (mode, kind) {
                (SnapshotMode::Latest, EntityKind::Issue) => {
                    Some(self.adding_user_attribution(&rows, reference.anon_id).await?)
                }
                _ => None,
            };
            sort_for_coalescing(&mut rows, attribution.as_ref());

            let mut coalescer =
                ChangeCoalescer::new(self.config.coalesce.epsilon(), self.config.coalesce.merge_rule);
            if let Some(attribution) = attribution {
                coalescer = coalescer.with_attribution(attribution);
            }

            let mut stats = MigrateStats {
                rows: total,
                ..Default::default()
            };
            let mut tx = self.db.begin().await?;

            for (index, row) in rows.into_iter().enumerate() {
                if let Some(group) = coalescer.push(row) {
                    write_group(&mut tx, &emitter, &group, &mut stats).await?;
                }
                if (index + 1) % PROGRESS_INTERVAL == 0 {
                    info!("MIGRATE {}: {} of {} rows converted", kind, index + 1, total);
                }
            }
            if let Some(group) = coalescer.finish() {
                write_group(&mut tx, &emitter, &group, &mut stats).await?;
            }

            tx.commit().await?;
            let in_target = count_changesets(&self.db, kind.change_type().code()).await?;
            info!(
                "MIGRATE {} complete: {} ({} migrated changesets in target)",
                kind,
                stats.display_string(),
                in_target
            );
            self.statistics.migrate.insert(kind, stats);
        }

        Ok(())
    }

    /// Adding users of issues that postdate the earliest snapshot
    async fn adding_user_attribution(
        &self,
        rows: &[LogRow],
        anon_id: i64,
    ) -> Result<AddingUserAttribution> {
        let path = self.config.database.earliest_snapshot.as_deref().ok_or_else(|| {
            Error::Config("Migrating the latest snapshot needs database.earliest_snapshot".to_string())
        })?;

        let earliest = LegacySnapshot::open(path).await?;
        let mut established = earliest.issues_with_stories().await?;
        established.extend(issues_revised_before(&self.db, self.config.timeline.earliest_data_date).await?);

        Ok(AddingUserAttribution::build(
            rows,
            &established,
            anon_id,
            self.config.timeline.dawn_of_time,
        ))
    }
}

async fn write_group(
    conn: &mut SqliteConnection,
    emitter: &RevisionEmitter<'_>,
    group: &CoalescedGroup,
    stats: &mut MigrateStats,
) -> Result<()> {
    let draft = emitter.emit(group)?;
    let changeset_id = insert_changeset(conn, &draft).await?;
    debug!(
        "Changeset {} for owner {} by {} at {}",
        changeset_id, group.owner_id, draft.indexer_id, draft.created
    );

    stats.changesets += 1;
    stats.revisions += draft.revisions.len();
    if group.is_addition() {
        stats.additions += 1;
    }
    if group.attributed_to.is_some() {
        stats.attributed += 1;
    }
    Ok(())
}
