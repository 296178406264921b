//! Kind-specific field values of a legacy log row

use gcd_common::db::EntityKind;
use gcd_common::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherFields {
    pub name: String,
    pub notes: String,
    pub year_began: Option<i64>,
    pub year_ended: Option<i64>,
    pub country_id: i64,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesFields {
    pub name: String,
    pub country_code: String,
    pub language_code: String,
    pub format: String,
    pub notes: String,
    pub publisher_id: i64,
    pub publication_notes: String,
    pub tracking_notes: String,
    pub year_began: i64,
    pub year_ended: Option<i64>,
    pub imprint_id: Option<i64>,
    /// Resolved from `country_code` by the value fixer
    #[serde(default)]
    pub country_id: Option<i64>,
    /// Resolved from `language_code` by the value fixer
    #[serde(default)]
    pub language_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    pub number: String,
    pub volume: Option<i64>,
    pub series_id: i64,
    pub publication_date: String,
    pub key_date: String,
    pub price: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryFields {
    pub issue_id: i64,
    pub sequence_number: i64,
    pub title: String,
    pub feature: String,
    /// Story type as typed into the old site
    pub type_name: String,
    /// Canonical story type, resolved by the value fixer
    #[serde(default)]
    pub type_id: Option<i64>,
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

/// Field values of one row, one variant per entity kind
#[derive(Debug, Clone, PartialEq)]
pub enum LogPayload {
    Publisher(PublisherFields),
    Series(SeriesFields),
    Issue(IssueFields),
    Story(StoryFields),
}

impl LogPayload {
    pub fn kind(&self) -> EntityKind {
        match self {
            LogPayload::Publisher(_) => EntityKind::Publisher,
            LogPayload::Series(_) => EntityKind::Series,
            LogPayload::Issue(_) => EntityKind::Issue,
            LogPayload::Story(_) => EntityKind::Story,
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            LogPayload::Publisher(f) => serde_json::to_value(f)?,
            LogPayload::Series(f) => serde_json::to_value(f)?,
            LogPayload::Issue(f) => serde_json::to_value(f)?,
            LogPayload::Story(f) => serde_json::to_value(f)?,
        };
        Ok(value)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(self.to_value()?.to_string())
    }

    /// Decode a payload stored in the working table
    pub fn from_json(kind: EntityKind, json: &str) -> Result<Self> {
        let payload = match kind {
            EntityKind::Publisher => LogPayload::Publisher(serde_json::from_str(json)?),
            EntityKind::Series => LogPayload::Series(serde_json::from_str(json)?),
            EntityKind::Issue => LogPayload::Issue(serde_json::from_str(json)?),
            EntityKind::Story => LogPayload::Story(serde_json::from_str(json)?),
        };
        Ok(payload)
    }

    /// Values of the kind's duplicate fields, in descriptor order
    pub fn duplicate_values(&self) -> Result<Vec<serde_json::Value>> {
        let value = self.to_value()?;
        let object = value.as_object().ok_or_else(|| {
            Error::Internal(format!("{} payload is not an object", self.kind()))
        })?;

        self.kind()
            .descriptor()
            .duplicate_fields
            .iter()
            .map(|field| {
                object.get(*field).cloned().ok_or_else(|| {
                    Error::Internal(format!("{} payload has no field '{}'", self.kind(), field))
                })
            })
            .collect()
    }
}
