//! Value Fixer
//!
//! Cleans legacy values against the target's reference data and drops rows
//! that cannot be migrated:
//! - rows whose entity is missing from the target (and imprint publishers)
//! - issues of missing series, stories of missing issues
//!
//! Remaps: legacy `uk` country, unknown countries, miscoded series
//! languages, missing series publishers and imprints, issue key-date
//! separators and story type names.

use crate::db::ReferenceData;
use crate::models::{IssueFields, LegacyRow, LogPayload, PublisherFields, SeriesFields, StoryFields};
use gcd_common::db::EntityKind;
use gcd_common::Result;
use std::collections::HashSet;
use tracing::{info, warn};

/// Legacy country id of the United Kingdom, retired in favour of `gb`
const LEGACY_UK_COUNTRY_ID: i64 = 223;
const GB_COUNTRY_ID: i64 = 75;

/// (country codes, miscoded language codes, corrected language code)
const LANGUAGE_FIXES: &[(&[&str], &[&str], &str)] = &[
    (&["nl"], &["du", "dy"], "nl"),
    (&["dk"], &["dk"], "da"),
    (&["se"], &["ev"], "sv"),
    (&["us", "uk", "jp"], &["us", "en,", "en;", "ed", "em", "ea"], "en"),
    (&["us", "mx"], &["sp", "mx"], "es"),
    (&["us"], &["po"], "pt"),
    (&["gr"], &["gr", "gk"], "el"),
    (&["it"], &["ir"], "it"),
    (&["jp"], &["jp"], "ja"),
];

/// (canonical story type, legacy spellings)
const STORY_TYPE_ALIASES: &[(&str, &[&str])] = &[
    ("activity", &["activity"]),
    ("advertisement", &["advertisement", "ad"]),
    (
        "(backcovers) *do not use* / *please fix*",
        &["backcovers", "backcover", "back cover"],
    ),
    (
        "biography (nonfictional)",
        &["biography", "bio", "biography (nonfictional)"],
    ),
    ("cartoon", &["cartoon", "cartoons"]),
    ("cover", &["cover", "front cover"]),
    (
        "cover reprint (on interior page)",
        &["cover reprint", "cover reprints", "cover reprint (on interior page)"],
    ),
    ("credits", &["credits"]),
    ("filler", &["filler"]),
    (
        "foreword, introduction, preface, afterword",
        &[
            "foreword",
            "foreward",
            "intro",
            "introduction",
            "foreword, introduction, preface, afterword",
        ],
    ),
    (
        "insert or dust jacket",
        &["insert", "dust jacket", "insert or dust jacket"],
    ),
    (
        "letters page",
        &["letter", "letter page", "letters page", "letters"],
    ),
    ("photo story", &["photo story"]),
    (
        "illustration",
        &["pinup", "illustration", "illustrations", "pin-up", "pin up"],
    ),
    ("character profile", &["profile", "character profile"]),
    (
        "promo (ad from the publisher)",
        &["promo", "house ad", "house ads", "promo (ad from the publisher)"],
    ),
    (
        "public service announcement",
        &["psa", "public service", "public service announcement"],
    ),
    ("recap", &["recap"]),
    ("comic story", &["story"]),
    ("text article", &["text article"]),
    ("text story", &["text story"]),
    ("statement of ownership", &["statement of ownership"]),
];

/// Counts reported by one fixer pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixReport {
    pub kept: usize,
    pub dropped_missing_entity: usize,
    pub dropped_imprints: usize,
    pub dropped_orphans: usize,
    pub remapped: usize,
}

impl FixReport {
    pub fn dropped(&self) -> usize {
        self.dropped_missing_entity + self.dropped_imprints + self.dropped_orphans
    }
}

pub struct ValueFixer<'a> {
    reference: &'a ReferenceData,
}

impl<'a> ValueFixer<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// Clean one kind's rows, dropping those that cannot be migrated
    pub fn fix(&self, kind: EntityKind, rows: Vec<LegacyRow>) -> Result<(Vec<LegacyRow>, FixReport)> {
        let mut report = FixReport::default();
        let mut kept = Vec::with_capacity(rows.len());
        let mut missing_story_types = HashSet::new();

        for mut row in rows {
            if !self.entity_exists(kind, row.entity_id) {
                report.dropped_missing_entity += 1;
                continue;
            }

            let remapped = match &mut row.payload {
                LogPayload::Publisher(fields) => {
                    if !self.reference.publishers.get(&row.entity_id).copied().unwrap_or(false) {
                        report.dropped_imprints += 1;
                        continue;
                    }
                    self.fix_publisher(fields)?
                }
                LogPayload::Series(fields) => self.fix_series(fields)?,
                LogPayload::Issue(fields) => {
                    if !self.reference.series.contains_key(&fields.series_id) {
                        report.dropped_orphans += 1;
                        continue;
                    }
                    fix_issue(fields)
                }
                LogPayload::Story(fields) => {
                    if !self.reference.issues.contains_key(&fields.issue_id) {
                        report.dropped_orphans += 1;
                        continue;
                    }
                    self.fix_story(fields, &mut missing_story_types)
                }
            };

            if remapped {
                report.remapped += 1;
            }
            kept.push(row);
        }

        for name in &missing_story_types {
            warn!("Story type '{}' missing from target, using '(unknown)'", name);
        }

        report.kept = kept.len();
        info!(
            "Fixed {} values: {} kept, {} dropped ({} missing, {} imprints, {} orphans), {} remapped",
            kind,
            report.kept,
            report.dropped(),
            report.dropped_missing_entity,
            report.dropped_imprints,
            report.dropped_orphans,
            report.remapped
        );

        Ok((kept, report))
    }

    fn entity_exists(&self, kind: EntityKind, id: i64) -> bool {
        match kind {
            EntityKind::Publisher => self.reference.publishers.contains_key(&id),
            EntityKind::Series => self.reference.series.contains_key(&id),
            EntityKind::Issue => self.reference.issues.contains_key(&id),
            EntityKind::Story => self.reference.stories.contains_key(&id),
        }
    }

    fn fix_publisher(&self, fields: &mut PublisherFields) -> Result<bool> {
        let original = fields.country_id;
        if fields.country_id == LEGACY_UK_COUNTRY_ID {
            fields.country_id = GB_COUNTRY_ID;
        }
        if !self.reference.country_ids.contains(&fields.country_id) {
            fields.country_id = self.reference.unknown_country()?;
        }
        Ok(fields.country_id != original)
    }

    fn fix_series(&self, fields: &mut SeriesFields) -> Result<bool> {
        let mut remapped = false;

        fields.country_id = Some(match self.reference.countries_by_code.get(&fields.country_code) {
            Some(id) => *id,
            None => {
                remapped = true;
                self.reference.unknown_country()?
            }
        });

        if let Some(code) = corrected_language(&fields.country_code, &fields.language_code) {
            fields.language_code = code.to_string();
            remapped = true;
        }

        fields.language_id = Some(match self.reference.languages_by_code.get(&fields.language_code) {
            Some(id) => *id,
            None => {
                remapped = true;
                self.reference.undetermined_language_id
            }
        });

        if !self.reference.publishers.contains_key(&fields.publisher_id) {
            fields.publisher_id = self.reference.unknown_publisher()?;
            remapped = true;
        }

        if let Some(imprint_id) = fields.imprint_id {
            if !self.reference.publishers.contains_key(&imprint_id) {
                fields.imprint_id = None;
                remapped = true;
            }
        }

        Ok(remapped)
    }

    fn fix_story(&self, fields: &mut StoryFields, missing: &mut HashSet<&'static str>) -> bool {
        let canonical = canonical_story_type(&fields.type_name);
        let resolved = canonical.and_then(|name| {
            let id = self.reference.story_types_by_name.get(name).copied();
            if id.is_none() {
                missing.insert(name);
            }
            id
        });

        match resolved {
            Some(id) => {
                fields.type_id = Some(id);
                canonical != Some(fields.type_name.as_str())
            }
            None => {
                fields.type_id = Some(self.reference.unknown_story_type_id);
                true
            }
        }
    }
}

fn fix_issue(fields: &mut IssueFields) -> bool {
    if fields.key_date.contains('.') {
        fields.key_date = fields.key_date.replace('.', "-");
        true
    } else {
        false
    }
}

/// Corrected language code for a series published in `country_code`
fn corrected_language(country_code: &str, language_code: &str) -> Option<&'static str> {
    LANGUAGE_FIXES
        .iter()
        .find(|(countries, codes, _)| {
            countries.contains(&country_code) && codes.contains(&language_code)
        })
        .map(|(_, _, fixed)| *fixed)
}

/// Canonical story type for a legacy spelling
fn canonical_story_type(legacy: &str) -> Option<&'static str> {
    STORY_TYPE_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&legacy))
        .map(|(canonical, _)| *canonical)
}
