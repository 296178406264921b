//! Changeset/Revision Emitter
//!
//! Turns a coalesced group into a [`ChangesetDraft`]: approved, migrated,
//! credited to the group's editor (or the attributed adding user) and
//! approved by anon, stamped with the group's latest row time.

use super::change_coalescer::CoalescedGroup;
use crate::db::ReferenceData;
use crate::models::{IssueFields, LogPayload, LogRow, SeriesFields, StoryFields};
use chrono::{NaiveDate, NaiveDateTime};
use gcd_common::config::TimelineConfig;
use gcd_common::db::{
    ChangesetDraft, ChangesetState, CommentDraft, IssueRevision, PublisherRevision, Revision,
    SeriesRevision, StoryRevision,
};
use gcd_common::{Error, Result};

pub const COMMENT_TEXT: &str = "This change history was migrated from the old site.";

/// Series ending before this year get `no_isbn` on their issues
const ISBN_INTRODUCED: i64 = 1970;
/// Series ending before this year get `no_barcode` on their issues
const BARCODE_INTRODUCED: i64 = 1974;

pub struct RevisionEmitter<'a> {
    reference: &'a ReferenceData,
    old_site_creation_date: NaiveDate,
    earliest_data_date: NaiveDateTime,
}

impl<'a> RevisionEmitter<'a> {
    pub fn new(reference: &'a ReferenceData, timeline: &TimelineConfig) -> Self {
        Self {
            reference,
            old_site_creation_date: timeline.old_site_creation_date,
            earliest_data_date: timeline.earliest_data_date,
        }
    }

    pub fn emit(&self, group: &CoalescedGroup) -> Result<ChangesetDraft> {
        let mut revisions = Vec::with_capacity(group.len() + 1);
        match group.primary() {
            Some(row) => revisions.push(self.convert(row)?),
            None => revisions.push(self.placeholder_issue(group.owner_id)?),
        }
        for row in group.satellites() {
            revisions.push(self.convert(row)?);
        }

        let indexer_id = group.attributed_to.unwrap_or(group.editor_id);
        Ok(ChangesetDraft {
            indexer_id,
            approver_id: self.reference.anon_id,
            state: ChangesetState::Approved,
            change_type: group.kind().change_type(),
            created: group.created(),
            migrated: true,
            date_inferred: group.date_inferred(),
            comment: CommentDraft {
                commenter_id: indexer_id,
                text: self.comment_text(group),
                old_state: ChangesetState::Approved,
                new_state: ChangesetState::Approved,
            },
            revisions,
        })
    }

    fn comment_text(&self, group: &CoalescedGroup) -> String {
        let mut text = COMMENT_TEXT.to_string();
        if !group.is_addition() {
            return text;
        }
        text.push_str("\nThis is the oldest change we have for this object, so it shows as the addition.\n");
        if group.attributed_to.is_some() {
            text.push_str(&format!(
                "It was added sometime after {}, and is likely close in time to the next change with an actual date.\n\
                 The assignment of an indexer to this changeset is based on a heuristic, which in some rare situations results in wrong results.\n",
                self.earliest_data_date.date()
            ));
        } else {
            text.push_str(&format!(
                "However, it may just be the state of the object at the time when the data was first imported into the old site circa {}.\n",
                self.old_site_creation_date
            ));
        }
        text
    }

    /// Revision holding one row's state
    pub fn convert(&self, row: &LogRow) -> Result<Revision> {
        match &row.payload {
            LogPayload::Publisher(p) => Ok(Revision::Publisher(PublisherRevision {
                publisher_id: row.entity_id,
                name: p.name.clone(),
                country_id: p.country_id,
                year_began: p.year_began,
                year_ended: p.year_ended,
                notes: p.notes.clone(),
                url: p.url.clone(),
                is_master: true,
            })),
            LogPayload::Series(s) => self.series_revision(row.entity_id, s).map(Revision::Series),
            LogPayload::Issue(i) => self.issue_revision(row.entity_id, i).map(Revision::Issue),
            LogPayload::Story(s) => self.story_revision(row.entity_id, s).map(Revision::Story),
        }
    }

    fn series_revision(&self, series_id: i64, s: &SeriesFields) -> Result<SeriesRevision> {
        let unresolved = |what: &str| Error::Internal(format!("Series {} has no resolved {}", series_id, what));
        Ok(SeriesRevision {
            series_id,
            name: s.name.clone(),
            format: s.format.clone(),
            year_began: s.year_began,
            year_ended: s.year_ended,
            publication_notes: s.publication_notes.clone(),
            tracking_notes: s.tracking_notes.clone(),
            notes: s.notes.clone(),
            country_id: s.country_id.ok_or_else(|| unresolved("country"))?,
            language_id: s.language_id.ok_or_else(|| unresolved("language"))?,
            publisher_id: s.publisher_id,
            imprint_id: s.imprint_id,
        })
    }

    fn issue_revision(&self, issue_id: i64, i: &IssueFields) -> Result<IssueRevision> {
        let (no_isbn, no_barcode) = self.identifier_flags(i.series_id)?;
        Ok(IssueRevision {
            issue_id,
            series_id: i.series_id,
            number: i.number.clone(),
            volume: i.volume.map(|v| v.to_string()).unwrap_or_default(),
            publication_date: i.publication_date.clone(),
            key_date: i.key_date.clone(),
            price: i.price.clone(),
            no_isbn,
            no_barcode,
        })
    }

    fn story_revision(&self, story_id: i64, s: &StoryFields) -> Result<StoryRevision> {
        let type_id = s
            .type_id
            .ok_or_else(|| Error::Internal(format!("Story {} has no resolved story type", story_id)))?;
        Ok(StoryRevision {
            story_id,
            issue_id: s.issue_id,
            sequence_number: s.sequence_number,
            title: s.title.clone(),
            feature: s.feature.clone(),
            type_id,
            page_count: s.page_count,
            script: s.script.clone(),
            pencils: s.pencils.clone(),
            inks: s.inks.clone(),
            colors: s.colors.clone(),
            letters: s.letters.clone(),
            editing: s.editing.clone(),
            genre: s.genre.clone(),
            characters: s.characters.clone(),
            synopsis: s.synopsis.clone(),
            reprint_notes: s.reprint_notes.clone(),
            job_number: s.job_number.clone(),
            notes: s.notes.clone(),
        })
    }

    /// Issue revision for a story-only group of an issue with no logged
    /// state yet, taken from the target issue
    fn placeholder_issue(&self, issue_id: i64) -> Result<Revision> {
        let issue = self.reference.issue(issue_id)?;
        let (no_isbn, no_barcode) = self.identifier_flags(issue.series_id)?;
        Ok(Revision::Issue(IssueRevision {
            issue_id,
            series_id: issue.series_id,
            number: issue.number.clone(),
            volume: String::new(),
            publication_date: String::new(),
            key_date: String::new(),
            price: String::new(),
            no_isbn,
            no_barcode,
        }))
    }

    fn identifier_flags(&self, series_id: i64) -> Result<(bool, bool)> {
        let series = self.reference.series(series_id)?;
        Ok(match series.year_ended.filter(|year| *year != 0) {
            Some(year) => (year < ISBN_INTRODUCED, year < BARCODE_INTRODUCED),
            None => (false, false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::reference::{IssueRef, SeriesRef};
    use crate::models::log_row::test_support::*;
    use crate::services::change_coalescer::ChangeCoalescer;
    use chrono::Duration;
    use gcd_common::config::MergeRule;
    use gcd_common::db::ChangeType;

    const ANON: i64 = 1;

    fn reference() -> ReferenceData {
        let mut reference = ReferenceData {
            anon_id: ANON,
            ..Default::default()
        };
        reference.series.insert(3, SeriesRef { publisher_id: 1, year_ended: Some(1972) });
        reference.series.insert(4, SeriesRef { publisher_id: 1, year_ended: None });
        reference.issues.insert(42, IssueRef { number: "17".to_string(), series_id: 3 });
        reference
    }

    fn group(rows: Vec<LogRow>) -> CoalescedGroup {
        let mut groups = ChangeCoalescer::new(Duration::days(5), MergeRule::LatestPerSubEntity).coalesce(rows);
        assert_eq!(groups.len(), 1);
        groups.remove(0)
    }

    #[test]
    fn test_changeset_fields() {
        let reference = reference();
        let emitter = RevisionEmitter::new(&reference, &TimelineConfig::default());
        let g = group(vec![row(1, 10, 7, at("2005-01-01", "10:00:00"), publisher_payload("DC"))]);

        let draft = emitter.emit(&g).unwrap();

        assert_eq!(draft.indexer_id, 7);
        assert_eq!(draft.approver_id, ANON);
        assert_eq!(draft.state, ChangesetState::Approved);
        assert_eq!(draft.change_type, ChangeType::Publisher);
        assert_eq!(draft.created, at("2005-01-01", "10:00:00"));
        assert!(draft.migrated);
        assert_eq!(draft.comment.text, COMMENT_TEXT);
        match &draft.revisions[0] {
            Revision::Publisher(p) => assert!(p.is_master),
            other => panic!("unexpected revision {:?}", other),
        }
    }

    #[test]
    fn test_addition_comment_mentions_old_site() {
        let reference = reference();
        let emitter = RevisionEmitter::new(&reference, &TimelineConfig::default());
        let mut addition = row(1, 10, ANON, at("2002-01-01", "00:00:00"), publisher_payload("DC"));
        addition.is_addition = true;

        let draft = emitter.emit(&group(vec![addition])).unwrap();

        assert!(draft.comment.text.starts_with(COMMENT_TEXT));
        assert!(draft.comment.text.contains("circa 2002-11-13"));
    }

    #[test]
    fn test_attributed_addition_credits_adding_user() {
        let reference = reference();
        let emitter = RevisionEmitter::new(&reference, &TimelineConfig::default());
        let mut addition = row(1, 42, ANON, at("2002-01-01", "00:00:00"), issue_payload(3, "17"));
        addition.is_addition = true;
        let mut g = group(vec![addition]);
        g.attributed_to = Some(9);

        let draft = emitter.emit(&g).unwrap();

        assert_eq!(draft.indexer_id, 9);
        assert_eq!(draft.comment.commenter_id, 9);
        assert!(draft.comment.text.contains("added sometime after 2004-09-01"));
    }

    #[test]
    fn test_issue_flags_from_series_end_year() {
        let reference = reference();
        let emitter = RevisionEmitter::new(&reference, &TimelineConfig::default());

        match emitter.convert(&row(1, 42, 7, at("2005-01-01", "10:00:00"), issue_payload(3, "17"))).unwrap() {
            Revision::Issue(i) => {
                assert!(!i.no_isbn);
                assert!(i.no_barcode);
                assert_eq!(i.volume, "");
            }
            other => panic!("unexpected revision {:?}", other),
        }

        match emitter.convert(&row(2, 43, 7, at("2005-01-01", "10:00:00"), issue_payload(4, "1"))).unwrap() {
            Revision::Issue(i) => assert!(!i.no_isbn && !i.no_barcode),
            other => panic!("unexpected revision {:?}", other),
        }
    }

    #[test]
    fn test_story_only_group_gets_placeholder_issue() {
        let reference = reference();
        let emitter = RevisionEmitter::new(&reference, &TimelineConfig::default());
        let g = group(vec![row(1, 500, 7, at("2005-01-01", "10:00:00"), story_payload(42, "a"))]);

        let draft = emitter.emit(&g).unwrap();

        assert_eq!(draft.change_type, ChangeType::Issue);
        assert_eq!(draft.revisions.len(), 2);
        match &draft.revisions[0] {
            Revision::Issue(i) => {
                assert_eq!(i.issue_id, 42);
                assert_eq!(i.number, "17");
                assert_eq!(i.series_id, 3);
            }
            other => panic!("unexpected revision {:?}", other),
        }
        assert_eq!(draft.revisions[1].kind(), gcd_common::db::EntityKind::Story);
    }

    #[test]
    fn test_story_edit_after_issue_edit_keeps_issue_state() {
        let reference = reference();
        let emitter = RevisionEmitter::new(&reference, &TimelineConfig::default());
        let mut issue = row(1, 42, 7, at("2005-01-01", "10:00:00"), issue_payload(3, "17"));
        if let LogPayload::Issue(fields) = &mut issue.payload {
            fields.price = "0.10 USD".to_string();
            fields.publication_date = "May 1962".to_string();
        }
        let rows = vec![issue, row(2, 500, 8, at("2005-02-01", "10:00:00"), story_payload(42, "a"))];
        let groups = ChangeCoalescer::new(Duration::days(5), MergeRule::LatestPerSubEntity).coalesce(rows);
        assert_eq!(groups.len(), 2);

        let draft = emitter.emit(&groups[1]).unwrap();

        assert_eq!(draft.indexer_id, 8);
        assert_eq!(draft.created, at("2005-02-01", "10:00:00"));
        assert_eq!(draft.comment.text, COMMENT_TEXT);
        assert_eq!(draft.revisions.len(), 2);
        match &draft.revisions[0] {
            Revision::Issue(i) => {
                assert_eq!(i.price, "0.10 USD");
                assert_eq!(i.publication_date, "May 1962");
            }
            other => panic!("unexpected revision {:?}", other),
        }
    }

    #[test]
    fn test_missing_reference_is_an_error() {
        let reference = reference();
        let emitter = RevisionEmitter::new(&reference, &TimelineConfig::default());

        let err = emitter
            .convert(&row(1, 50, 7, at("2005-01-01", "10:00:00"), issue_payload(99, "1")))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
