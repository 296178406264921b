//! Data models for the history migration

pub mod log_row;
pub mod payload;

pub use log_row::{LegacyRow, LogRow};
pub use payload::{IssueFields, LogPayload, PublisherFields, SeriesFields, StoryFields};
