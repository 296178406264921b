//! Pipeline stages of the history migration
//!
//! PREPARE: value fixer → log aligner → duplicate marker → time normalizer.
//! MIGRATE: change coalescer → revision emitter.
//! The workflow orchestrator runs them in that order.

pub mod adding_user;
pub mod change_coalescer;
pub mod duplicate_marker;
pub mod log_aligner;
pub mod revision_emitter;
pub mod time_normalizer;
pub mod value_fixer;
pub mod workflow_orchestrator;

pub use adding_user::AddingUserAttribution;
pub use change_coalescer::{sort_for_coalescing, ChangeCoalescer, CoalescedGroup, GroupMember, MemberKey};
pub use duplicate_marker::{mark_duplicates, DuplicateReport};
pub use log_aligner::{AlignReport, LogAligner};
pub use revision_emitter::RevisionEmitter;
pub use time_normalizer::{NormalizeReport, TimeNormalizer, TimeStrategy};
pub use value_fixer::{FixReport, ValueFixer};
pub use workflow_orchestrator::{MigrationOrchestrator, MigrationStatistics, SnapshotMode};
