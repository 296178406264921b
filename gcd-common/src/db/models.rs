//! Database models
//!
//! Entity kinds of the legacy log, plus the changeset and revision records
//! written to the target database.

use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of catalog entity a legacy log row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Publisher,
    Series,
    Issue,
    Story,
}

/// Static description of where a kind lives in the legacy and target schemas
#[derive(Debug)]
pub struct EntityDescriptor {
    pub kind: EntityKind,
    /// Legacy log table
    pub original_table: &'static str,
    /// Legacy current-state table; its rows are the final state of each entity
    pub current_table: &'static str,
    /// Target table the owning entity must exist in
    pub display_table: &'static str,
    /// Legacy column naming the owning entity
    pub source_id: &'static str,
    /// Payload fields that define content equality between two rows
    pub duplicate_fields: &'static [&'static str],
}

static PUBLISHER: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Publisher,
    original_table: "LogPublishers",
    current_table: "publishers",
    display_table: "publishers",
    source_id: "PublisherID",
    duplicate_fields: &["name", "notes", "year_began", "year_ended", "country_id", "url"],
};

static SERIES: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Series,
    original_table: "LogSeries",
    current_table: "series",
    display_table: "series",
    source_id: "SeriesID",
    duplicate_fields: &[
        "name",
        "country_code",
        "format",
        "language_code",
        "notes",
        "publisher_id",
        "publication_notes",
        "tracking_notes",
        "year_began",
        "year_ended",
        "imprint_id",
    ],
};

static ISSUE: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Issue,
    original_table: "LogIssues",
    current_table: "issues",
    display_table: "issues",
    source_id: "IssueID",
    duplicate_fields: &[
        "volume",
        "series_id",
        "publication_date",
        "price",
        "key_date",
        "number",
    ],
};

static STORY: EntityDescriptor = EntityDescriptor {
    kind: EntityKind::Story,
    original_table: "LogStories",
    current_table: "stories",
    display_table: "stories",
    source_id: "StoryID",
    duplicate_fields: &[
        "sequence_number",
        "title",
        "feature",
        "type_name",
        "page_count",
        "script",
        "pencils",
        "inks",
        "colors",
        "letters",
        "editing",
        "genre",
        "characters",
        "synopsis",
        "reprint_notes",
        "job_number",
        "notes",
    ],
};

impl EntityKind {
    /// Processing order of the migration
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Publisher,
        EntityKind::Series,
        EntityKind::Issue,
        EntityKind::Story,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Publisher => "publisher",
            EntityKind::Series => "series",
            EntityKind::Issue => "issue",
            EntityKind::Story => "story",
        }
    }

    pub fn descriptor(&self) -> &'static EntityDescriptor {
        match self {
            EntityKind::Publisher => &PUBLISHER,
            EntityKind::Series => &SERIES,
            EntityKind::Issue => &ISSUE,
            EntityKind::Story => &STORY,
        }
    }

    /// Change type of the changesets this kind's rows end up in.
    /// Story rows ride on issue changesets.
    pub fn change_type(&self) -> ChangeType {
        match self {
            EntityKind::Publisher => ChangeType::Publisher,
            EntityKind::Series => ChangeType::Series,
            EntityKind::Issue | EntityKind::Story => ChangeType::Issue,
        }
    }

    /// Whether undated rows of this kind all get the dawn-of-time date
    pub fn early_dates(&self) -> bool {
        matches!(self, EntityKind::Issue)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "publisher" => Ok(EntityKind::Publisher),
            "series" => Ok(EntityKind::Series),
            "issue" => Ok(EntityKind::Issue),
            "story" => Ok(EntityKind::Story),
            other => Err(Error::InvalidInput(format!("Unknown entity kind '{}'", other))),
        }
    }
}

/// Moderation state of a changeset. Migrated history is always approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangesetState {
    Approved,
}

impl ChangesetState {
    pub fn code(&self) -> i64 {
        match self {
            ChangesetState::Approved => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    Publisher,
    Issue,
    Series,
}

impl ChangeType {
    pub fn code(&self) -> i64 {
        match self {
            ChangeType::Publisher => 1,
            ChangeType::Issue => 2,
            ChangeType::Series => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherRevision {
    pub publisher_id: i64,
    pub name: String,
    pub country_id: i64,
    pub year_began: Option<i64>,
    pub year_ended: Option<i64>,
    pub notes: String,
    pub url: String,
    pub is_master: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRevision {
    pub series_id: i64,
    pub name: String,
    pub format: String,
    pub year_began: i64,
    pub year_ended: Option<i64>,
    pub publication_notes: String,
    pub tracking_notes: String,
    pub notes: String,
    pub country_id: i64,
    pub language_id: i64,
    pub publisher_id: i64,
    pub imprint_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRevision {
    pub issue_id: i64,
    pub series_id: i64,
    pub number: String,
    pub volume: String,
    pub publication_date: String,
    pub key_date: String,
    pub price: String,
    pub no_isbn: bool,
    pub no_barcode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRevision {
    pub story_id: i64,
    pub issue_id: i64,
    pub sequence_number: i64,
    pub title: String,
    pub feature: String,
    pub type_id: i64,
    pub page_count: Option<i64>,
    pub script: String,
    pub pencils: String,
    pub inks: String,
    pub colors: String,
    pub letters: String,
    pub editing: String,
    pub genre: String,
    pub characters: String,
    pub synopsis: String,
    pub reprint_notes: String,
    pub job_number: String,
    pub notes: String,
}

/// Snapshot of one entity's field values inside a changeset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Revision {
    Publisher(PublisherRevision),
    Series(SeriesRevision),
    Issue(IssueRevision),
    Story(StoryRevision),
}

impl Revision {
    pub fn kind(&self) -> EntityKind {
        match self {
            Revision::Publisher(_) => EntityKind::Publisher,
            Revision::Series(_) => EntityKind::Series,
            Revision::Issue(_) => EntityKind::Issue,
            Revision::Story(_) => EntityKind::Story,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub commenter_id: i64,
    pub text: String,
    pub old_state: ChangesetState,
    pub new_state: ChangesetState,
}

/// A changeset ready to be written, with its caller-supplied timestamp.
///
/// The changeset, its comment and every revision are stored with
/// `created = modified = created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesetDraft {
    pub indexer_id: i64,
    pub approver_id: i64,
    pub state: ChangesetState,
    pub change_type: ChangeType,
    pub created: NaiveDateTime,
    pub migrated: bool,
    pub date_inferred: bool,
    pub comment: CommentDraft,
    pub revisions: Vec<Revision>,
}
