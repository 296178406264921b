//! Change Coalescer
//!
//! Folds a stream of log rows, ordered by owner and time, into groups that
//! each become one changeset. A group ends when the owner changes, when the
//! editor changes, or when the next row comes more than `epsilon` after the
//! previous one. Inside a group a later row replaces the earlier row of the
//! same sub-entity (the owner itself, or one of its stories).
//!
//! A later group of the same owner without a fresh primary row carries the
//! owner's last primary state, so a story-only edit never blanks its issue.
//!
//! Preconditions (sorted input, duplicates removed) are the caller's job;
//! see [`sort_for_coalescing`].

use super::adding_user::AddingUserAttribution;
use crate::models::LogRow;
use chrono::{Duration, NaiveDateTime};
use gcd_common::config::MergeRule;
use gcd_common::db::EntityKind;
use std::collections::BTreeMap;
use tracing::debug;

/// Sub-entity slot of a group. The owner's own row sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberKey {
    Primary,
    /// Story riding on its issue, keyed by story id
    Satellite(i64),
}

impl MemberKey {
    pub fn of(row: &LogRow) -> Self {
        if row.is_satellite() {
            MemberKey::Satellite(row.entity_id)
        } else {
            MemberKey::Primary
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub row: LogRow,
    /// Copied from the owner's previous group under `carry_forward`
    pub carried: bool,
}

/// One future changeset: the latest row per sub-entity of one owner
#[derive(Debug, Clone, PartialEq)]
pub struct CoalescedGroup {
    pub owner_id: i64,
    pub editor_id: i64,
    pub members: BTreeMap<MemberKey, GroupMember>,
    /// Adding user credited with the owner's first group
    pub attributed_to: Option<i64>,
}

impl CoalescedGroup {
    fn new(owner_id: i64, editor_id: i64) -> Self {
        Self {
            owner_id,
            editor_id,
            members: BTreeMap::new(),
            attributed_to: None,
        }
    }

    fn insert(&mut self, row: LogRow, carried: bool) {
        self.members.insert(MemberKey::of(&row), GroupMember { row, carried });
    }

    /// Kind of the owner; a group made only of stories belongs to an issue
    pub fn kind(&self) -> EntityKind {
        match self.primary() {
            Some(row) => row.kind(),
            None => EntityKind::Issue,
        }
    }

    pub fn primary(&self) -> Option<&LogRow> {
        self.members.get(&MemberKey::Primary).map(|m| &m.row)
    }

    pub fn satellites(&self) -> impl Iterator<Item = &LogRow> {
        self.members
            .iter()
            .filter(|(key, _)| **key != MemberKey::Primary)
            .map(|(_, member)| &member.row)
    }

    /// Row that defines the changeset time: the latest fresh member,
    /// the primary winning ties
    pub fn changeset_row(&self) -> Option<&LogRow> {
        self.members
            .values()
            .filter(|m| !m.carried)
            .map(|m| &m.row)
            .max_by_key(|row| (row.timestamp(), !row.is_satellite()))
    }

    pub fn created(&self) -> NaiveDateTime {
        self.changeset_row()
            .map(LogRow::timestamp)
            .unwrap_or(NaiveDateTime::MIN)
    }

    pub fn date_inferred(&self) -> bool {
        self.changeset_row().is_some_and(|row| row.dt_inferred)
    }

    /// Whether the changeset shows as the owner's addition.
    /// Without any primary state, the row defining the changeset decides.
    pub fn is_addition(&self) -> bool {
        match self.members.get(&MemberKey::Primary) {
            Some(member) => !member.carried && member.row.is_addition,
            None => self.changeset_row().is_some_and(|row| row.is_addition),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Order rows the way the coalescer consumes them:
/// owner, time, primary before satellite, row id.
///
/// With adding-user attribution, an owner's anonymous dawn-day rows move
/// to the front of its stream so they form its first group together.
pub fn sort_for_coalescing(rows: &mut [LogRow], attribution: Option<&AddingUserAttribution>) {
    rows.sort_by_key(|r| {
        let leads = attribution.is_some_and(|a| a.leads(r));
        (r.owner_id(), !leads, r.timestamp(), r.is_satellite(), r.id)
    });
}

pub struct ChangeCoalescer {
    epsilon: Duration,
    merge_rule: MergeRule,
    attribution: Option<AddingUserAttribution>,
    current: Option<CoalescedGroup>,
    /// Latest primary row of the current owner
    last_primary: Option<LogRow>,
    last_user: Option<i64>,
    last_timestamp: NaiveDateTime,
}

impl ChangeCoalescer {
    pub fn new(epsilon: Duration, merge_rule: MergeRule) -> Self {
        Self {
            epsilon,
            merge_rule,
            attribution: None,
            current: None,
            last_primary: None,
            last_user: None,
            last_timestamp: NaiveDateTime::MIN,
        }
    }

    pub fn with_attribution(mut self, attribution: AddingUserAttribution) -> Self {
        self.attribution = Some(attribution);
        self
    }

    /// Feed the next row; returns the group it closed, if any
    pub fn push(&mut self, row: LogRow) -> Option<CoalescedGroup> {
        let owner_id = row.owner_id();
        let timestamp = row.timestamp();

        let boundary = match &self.current {
            None => true,
            Some(group) => {
                group.owner_id != owner_id
                    || self.last_user != Some(row.editor_id)
                    || self.beyond_epsilon(timestamp)
            }
        };

        let mut flushed = None;
        if boundary {
            let previous = self.current.take();
            let mut next = CoalescedGroup::new(owner_id, row.editor_id);

            match &previous {
                Some(prev) if prev.owner_id == owner_id => match self.merge_rule {
                    MergeRule::CarryForward => {
                        for member in prev.members.values() {
                            next.insert(member.row.clone(), true);
                        }
                    }
                    MergeRule::LatestPerSubEntity => {
                        if let Some(primary) = &self.last_primary {
                            next.insert(primary.clone(), true);
                        }
                    }
                },
                _ => {
                    self.last_primary = None;
                    next.attributed_to = self
                        .attribution
                        .as_ref()
                        .and_then(|a| a.adding_user(owner_id));
                }
            }

            if let Some(prev) = &previous {
                debug!(
                    "Group closed: owner {} editor {} with {} members",
                    prev.owner_id,
                    prev.editor_id,
                    prev.len()
                );
            }
            flushed = previous;
            self.current = Some(next);
        }

        self.last_user = Some(row.editor_id);
        self.last_timestamp = timestamp;
        if !row.is_satellite() {
            self.last_primary = Some(row.clone());
        }
        if let Some(group) = self.current.as_mut() {
            group.insert(row, false);
        }

        flushed
    }

    /// Whether `timestamp` lies more than epsilon after the previous row.
    /// An epsilon reaching past the calendar never splits.
    fn beyond_epsilon(&self, timestamp: NaiveDateTime) -> bool {
        self.last_timestamp
            .checked_add_signed(self.epsilon)
            .is_some_and(|limit| timestamp > limit)
    }

    /// Flush the trailing group
    pub fn finish(&mut self) -> Option<CoalescedGroup> {
        self.last_primary = None;
        self.last_user = None;
        self.last_timestamp = NaiveDateTime::MIN;
        self.current.take().filter(|g| !g.is_empty())
    }

    /// Coalesce a whole, already sorted stream
    pub fn coalesce(mut self, rows: impl IntoIterator<Item = LogRow>) -> Vec<CoalescedGroup> {
        let mut groups: Vec<CoalescedGroup> = rows.into_iter().filter_map(|row| self.push(row)).collect();
        groups.extend(self.finish());
        groups
    }
}
