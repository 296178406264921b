//! # GCD Common Library
//!
//! Shared code for the GCD change-history migration:
//! - Error type and result alias
//! - Migration configuration (TOML) and its resolution order
//! - Timestamp helpers for legacy and target columns
//! - Target database schema and changeset/revision records

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use config::MigrationConfig;
pub use error::{Error, Result};
