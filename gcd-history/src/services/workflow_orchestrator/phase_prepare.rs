//! Phase 1: PREPARE
//!
//! Legacy snapshot → `history_log`. Re-running replaces a kind's rows.

use super::{ordered_kinds, MigrationOrchestrator, PrepareStats};
use crate::db::log_tables::{clear_log_rows, save_log_rows};
use crate::db::{LegacySnapshot, ReferenceData};
use crate::services::{mark_duplicates, LogAligner, TimeNormalizer, ValueFixer};
use gcd_common::db::EntityKind;
use gcd_common::Result;
use tracing::info;

impl MigrationOrchestrator {
    /// Prepare the working rows of `kinds` (all kinds when empty)
    pub async fn prepare(&mut self, legacy: &LegacySnapshot, kinds: &[EntityKind]) -> Result<()> {
        let reference = ReferenceData::load(&self.db, &self.config.accounts.anon_username).await?;
        let legacy_ids = legacy.indexer_ids().await?;

        let fixer = ValueFixer::new(&reference);
        let aligner = LogAligner::new(
            reference.anon_id,
            self.config.timeline.dawn_of_time,
            reference.indexers.clone(),
        )
        .with_aliases(&self.config.accounts.aliases, &legacy_ids);

        for kind in ordered_kinds(kinds) {
            info!("PREPARE {}: loading {}", kind, kind.descriptor().original_table);
            let raw = legacy.load_rows(kind).await?;
            let loaded = raw.len();

            let (fixed, fix_report) = fixer.fix(kind, raw)?;
            let (mut rows, align_report) = aligner.align(fixed);
            let duplicate_report = mark_duplicates(&mut rows)?;
            let normalizer = TimeNormalizer::from_config(&self.config, kind);
            let normalize_report = normalizer.normalize(kind, &mut rows)?;

            let mut tx = self.db.begin().await?;
            let replaced = clear_log_rows(&mut tx, kind).await?;
            save_log_rows(&mut tx, &rows).await?;
            tx.commit().await?;

            let stats = PrepareStats {
                loaded,
                dropped: fix_report.dropped(),
                additions: align_report.additions,
                duplicates: duplicate_report.duplicates,
                dates_inferred: normalize_report.dates_inferred,
                replaced,
                stored: rows.len(),
            };
            info!("PREPARE {} complete: {}", kind, stats.display_string());
            self.statistics.prepare.insert(kind, stats);
        }

        Ok(())
    }
}
