//! Database access for the history migration
//!
//! Target-side schema lives in `gcd_common::db`; these modules read the
//! legacy snapshot and read/write the target's working and output tables.

pub mod changesets;
pub mod legacy;
pub mod log_tables;
pub mod reference;

pub use legacy::LegacySnapshot;
pub use reference::ReferenceData;
