//! gcd-history - change-history migration
//!
//! Rebuilds the change history of publishers, series, issues and stories
//! from the old site's log tables:
//!
//! - `prepare`: legacy snapshot → `history_log` working table
//! - `migrate`: `history_log` → approved, migrated changesets
//! - `run`: both, for every kind

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gcd_common::db::{init_database, EntityKind};
use gcd_common::MigrationConfig;
use gcd_history::db::LegacySnapshot;
use gcd_history::{MigrationOrchestrator, SnapshotMode};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for gcd-history
#[derive(Parser, Debug)]
#[command(name = "gcd-history")]
#[command(about = "Migrates the old site's change history into changesets")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Target database, overriding database.target
    #[arg(short, long, global = true)]
    target: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load, clean and normalize the legacy log tables
    Prepare {
        /// Kinds to prepare (all when omitted)
        #[arg(short, long, value_parser = parse_kind)]
        kind: Vec<EntityKind>,
    },
    /// Write changesets from the prepared rows
    Migrate {
        /// Snapshot the prepared rows came from
        #[arg(value_enum, default_value_t = SnapshotMode::Latest)]
        snapshot: SnapshotMode,

        /// Kinds to migrate (all when omitted); stories migrate with issues
        #[arg(short, long, value_parser = parse_kind)]
        kind: Vec<EntityKind>,

        /// Resume at this entity id, skipping smaller ones
        #[arg(long)]
        from_entity: Option<i64>,
    },
    /// Prepare and migrate every kind
    Run {
        #[arg(value_enum, default_value_t = SnapshotMode::Latest)]
        snapshot: SnapshotMode,
    },
}

fn parse_kind(value: &str) -> std::result::Result<EntityKind, String> {
    value.parse().map_err(|e: gcd_common::Error| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "gcd-history {} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let mut config = MigrationConfig::load(args.config.as_deref())
        .context("Failed to load migration configuration")?;
    if let Some(target) = args.target {
        config.database.target = target;
    }

    info!("Target database: {}", config.database.target.display());
    let db = init_database(&config.database.target)
        .await
        .with_context(|| format!("Failed to open target {}", config.database.target.display()))?;

    let legacy_path = config.database.legacy_snapshot.clone();
    let mut orchestrator = MigrationOrchestrator::new(db, config);

    match args.command {
        Command::Prepare { kind } => {
            let legacy = open_legacy(&legacy_path).await?;
            orchestrator.prepare(&legacy, &kind).await.context("Prepare failed")?;
        }
        Command::Migrate {
            snapshot,
            kind,
            from_entity,
        } => {
            orchestrator
                .migrate(snapshot, &kind, from_entity)
                .await
                .context("Migrate failed")?;
        }
        Command::Run { snapshot } => {
            let legacy = open_legacy(&legacy_path).await?;
            orchestrator.prepare(&legacy, &[]).await.context("Prepare failed")?;
            orchestrator
                .migrate(snapshot, &[], None)
                .await
                .context("Migrate failed")?;
        }
    }

    let statistics = orchestrator.statistics();
    for line in statistics.summary_lines() {
        info!("{}", line);
    }
    info!("Run {} complete", statistics.run_id);

    Ok(())
}

async fn open_legacy(path: &std::path::Path) -> Result<LegacySnapshot> {
    info!("Legacy snapshot: {}", path.display());
    LegacySnapshot::open(path)
        .await
        .with_context(|| format!("Failed to open legacy snapshot {}", path.display()))
}
