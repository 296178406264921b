//! gcd-history library interface
//!
//! Migrates the old site's log tables into changesets and revisions.
//! Exposed as a library so the pipeline can be driven from integration tests.

pub mod db;
pub mod models;
pub mod services;

pub use services::{MigrationOrchestrator, SnapshotMode};
