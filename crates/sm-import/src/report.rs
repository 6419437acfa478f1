use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use sm_core::differ::style_sections_equal;
use sm_core::engine::MatchEngine;
use sm_core::error::EngineError;
use sm_core::order::InjectionOrder;
use sm_core::types::{Style, StyleId};

/// How an incoming style relates to the resident set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportKind {
    Added,
    Unchanged,
    CodeOnly,
    MetaOnly,
    MetaAndCode,
}

/// Classified import, ready to apply. Every style carries its final id.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub added: Vec<Style>,
    pub unchanged: Vec<StyleId>,
    pub code_only: Vec<Style>,
    pub meta_only: Vec<Style>,
    pub meta_and_code: Vec<Style>,
    /// Backup id -> id the style ends up with
    #[serde(skip)]
    pub id_map: BTreeMap<StyleId, StyleId>,
}

impl ImportReport {
    /// Styles that would be written.
    pub fn changed_count(&self) -> usize {
        self.added.len() + self.code_only.len() + self.meta_only.len() + self.meta_and_code.len()
    }

    /// Kind of every classified style, by id.
    pub fn kinds(&self) -> Vec<(StyleId, ImportKind)> {
        let tagged = |styles: &[Style], kind: ImportKind| -> Vec<(StyleId, ImportKind)> {
            styles.iter().filter_map(|s| s.id).map(|id| (id, kind)).collect()
        };
        let mut kinds = tagged(&self.added, ImportKind::Added);
        kinds.extend(self.unchanged.iter().map(|&id| (id, ImportKind::Unchanged)));
        kinds.extend(tagged(&self.code_only, ImportKind::CodeOnly));
        kinds.extend(tagged(&self.meta_only, ImportKind::MetaOnly));
        kinds.extend(tagged(&self.meta_and_code, ImportKind::MetaAndCode));
        kinds.sort_unstable();
        kinds
    }

    /// Rewrite an order keyed by backup ids onto the final ids. Ids that
    /// name no imported style are dropped.
    pub fn remap_order(&self, order: &InjectionOrder) -> InjectionOrder {
        let remap = |ranks: &BTreeMap<StyleId, i64>| -> BTreeMap<StyleId, i64> {
            ranks
                .iter()
                .filter_map(|(id, &rank)| self.id_map.get(id).map(|&to| (to, rank)))
                .collect()
        };
        InjectionOrder {
            main: remap(&order.main),
            prio: remap(&order.prio),
        }
    }

    /// Push the changes into an engine.
    pub fn apply(&self, engine: &mut MatchEngine) -> Result<usize, EngineError> {
        for style in &self.added {
            engine.on_style_created(style.clone())?;
        }
        for style in self.code_only.iter().chain(&self.meta_only).chain(&self.meta_and_code) {
            engine.on_style_updated(style.clone())?;
        }
        Ok(self.changed_count())
    }
}

/// Classify `incoming` against the resident `existing` styles.
///
/// An incoming style is paired with the resident style of the same id when
/// their names agree, otherwise with the first unclaimed resident style of
/// the same name. Unpaired styles are added with fresh ids above the
/// highest resident id.
pub fn classify(existing: &[Style], incoming: Vec<Style>) -> ImportReport {
    let by_id: HashMap<StyleId, &Style> = existing
        .iter()
        .filter_map(|s| s.id.map(|id| (id, s)))
        .collect();
    let mut by_name: HashMap<&str, &Style> = HashMap::new();
    for style in existing {
        by_name.entry(style.name.trim()).or_insert(style);
    }
    let mut next_id = existing.iter().filter_map(|s| s.id).max().unwrap_or(0) + 1;
    let mut claimed: HashSet<StyleId> = HashSet::new();

    let mut report = ImportReport::default();

    for mut style in incoming {
        style.name = style.name.trim().to_string();
        let backup_id = style.id;

        let same_id = style
            .id
            .and_then(|id| by_id.get(&id))
            .filter(|old| old.name.trim() == style.name)
            .copied();
        let same_name = by_name.remove(style.name.as_str());
        let old = same_id.or(same_name).filter(|old| old.id.is_some_and(|id| !claimed.contains(&id)));

        let Some(old) = old else {
            if let Some(from) = backup_id {
                report.id_map.insert(from, next_id);
            }
            style.id = Some(next_id);
            next_id += 1;
            report.added.push(style);
            continue;
        };

        style.id = old.id;
        if let Some(id) = old.id {
            claimed.insert(id);
            if let Some(from) = backup_id {
                report.id_map.insert(from, id);
            }
        }

        match (meta_equal(old, &style), style_sections_equal(old, &style)) {
            (true, true) => report.unchanged.extend(old.id),
            (true, false) => report.code_only.push(style),
            (false, true) => report.meta_only.push(style),
            (false, false) => report.meta_and_code.push(style),
        }
    }

    log::info!(
        "Import: {} added, {} unchanged, {} updated",
        report.added.len(),
        report.unchanged.len(),
        report.code_only.len() + report.meta_only.len() + report.meta_and_code.len()
    );

    report
}

/// Everything but the sections.
fn meta_equal(a: &Style, b: &Style) -> bool {
    a.enabled == b.enabled
        && a.name.trim() == b.name.trim()
        && a.custom_name == b.custom_name
        && a.prefer_scheme == b.prefer_scheme
        && a.injection == b.injection
        && a.exclusions == b.exclusions
        && a.inclusions == b.inclusions
}
