//! Injection ordering
//!
//! Matched styles are emitted in two groups: `prio` first, then `main`.
//! Within a group, ranked styles come first by ascending rank, then the
//! rest by case-insensitive display name, with the style id as the final
//! tie-break so the order is total.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::index::StyleIndex;
use crate::types::{MatchResult, SectionRef, StyleId};

/// Which injection group a style belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Group {
    /// Injected first
    Prio,
    Main,
}

/// User-chosen ranks per group. A style appears in at most one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionOrder {
    pub main: BTreeMap<StyleId, i64>,
    pub prio: BTreeMap<StyleId, i64>,
}

impl InjectionOrder {
    /// Build ranks from ordered id lists; list position is the rank.
    pub fn from_lists(main: &[StyleId], prio: &[StyleId]) -> Result<Self, OrderError> {
        let mut seen = BTreeSet::new();
        let mut ranks = |ids: &[StyleId]| -> Result<BTreeMap<StyleId, i64>, OrderError> {
            let mut map = BTreeMap::new();
            for (pos, &id) in ids.iter().enumerate() {
                if !seen.insert(id) {
                    return Err(OrderError::DuplicateStyle(id));
                }
                map.insert(id, pos as i64 + 1);
            }
            Ok(map)
        };
        let prio = ranks(prio)?;
        let main = ranks(main)?;
        Ok(Self { main, prio })
    }

    /// Reject descriptors that put a style in both groups.
    pub fn validate(&self) -> Result<(), OrderError> {
        match self.main.keys().find(|id| self.prio.contains_key(id)) {
            Some(&id) => Err(OrderError::DuplicateStyle(id)),
            None => Ok(()),
        }
    }

    pub fn group_of(&self, id: StyleId) -> Option<(Group, i64)> {
        if let Some(&rank) = self.prio.get(&id) {
            return Some((Group::Prio, rank));
        }
        self.main.get(&id).map(|&rank| (Group::Main, rank))
    }

    /// Forget a style. Returns true if it was listed.
    pub fn remove_style(&mut self, id: StyleId) -> bool {
        let in_main = self.main.remove(&id).is_some();
        let in_prio = self.prio.remove(&id).is_some();
        in_main || in_prio
    }

    pub fn is_empty(&self) -> bool {
        self.main.is_empty() && self.prio.is_empty()
    }
}

// =============================================================================
// Ordering
// =============================================================================

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    group: Group,
    rank: Rank,
    name: String,
    id: StyleId,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Ranked(i64),
    /// Sorts after every rank
    Unranked,
}

fn sort_key(id: StyleId, order: Option<&InjectionOrder>, index: &StyleIndex) -> SortKey {
    let style = index.get(id).map(|entry| entry.style());
    let (group, rank) = match order.and_then(|o| o.group_of(id)) {
        Some((group, rank)) => (group, Some(rank)),
        None => {
            let injection = style.map(|s| s.injection).unwrap_or_default();
            let group = if injection.top { Group::Prio } else { Group::Main };
            (group, injection.rank)
        }
    };
    SortKey {
        group,
        rank: rank.map_or(Rank::Unranked, Rank::Ranked),
        name: style.map(|s| s.display_name().to_lowercase()).unwrap_or_default(),
        id,
    }
}

/// Sort style ids into injection order.
pub fn sort_styles(
    ids: impl IntoIterator<Item = StyleId>,
    order: Option<&InjectionOrder>,
    index: &StyleIndex,
) -> Vec<StyleId> {
    let mut keyed: Vec<SortKey> = ids.into_iter().map(|id| sort_key(id, order, index)).collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|key| key.id).collect()
}

/// Flatten a match result into sections in injection order. Styles that
/// only appear in `maybe_match` are not emitted.
pub fn order(result: &MatchResult, order: Option<&InjectionOrder>, index: &StyleIndex) -> Vec<SectionRef> {
    sort_styles(result.style_ids(), order, index)
        .into_iter()
        .flat_map(|style_id| {
            let sections = result.sections.get(&style_id).into_iter().flatten();
            sections.map(move |&section| SectionRef { style_id, index: section })
        })
        .collect()
}
