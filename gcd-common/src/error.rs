//! Common error types for the GCD history migration

use thiserror::Error;

/// Common result type for migration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the migration crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload (de)serialization error for working-table rows
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced entity missing from the target or legacy database
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed legacy value (unparseable date, unknown kind tag, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal invariant broken
    #[error("Internal error: {0}")]
    Internal(String),
}
