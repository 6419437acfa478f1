use std::collections::HashMap;

use sm_core::differ::style_sections_equal;
use sm_core::types::{Style, StyleId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupeStats {
    pub before: usize,
    pub after: usize,
    /// Earlier entries replaced by a later one with the same id
    pub replaced: usize,
    /// Entries identical to one already kept
    pub duplicates: usize,
}

/// Collapse a backup's styles: a later entry with an id already seen
/// replaces the earlier one in place, and exact duplicates (same name and
/// equal sections) are dropped.
pub fn dedupe_styles(styles: &mut Vec<Style>) -> DedupeStats {
    let before = styles.len();
    let mut replaced = 0usize;
    let mut duplicates = 0usize;

    let mut kept: Vec<Style> = Vec::with_capacity(styles.len());
    let mut slot_by_id: HashMap<StyleId, usize> = HashMap::new();

    for style in styles.drain(..) {
        if let Some(slot) = style.id.and_then(|id| slot_by_id.get(&id).copied()) {
            kept[slot] = style;
            replaced += 1;
            continue;
        }
        let duplicate = kept
            .iter()
            .any(|other| other.name == style.name && style_sections_equal(other, &style));
        if duplicate {
            duplicates += 1;
            continue;
        }
        if let Some(id) = style.id {
            slot_by_id.insert(id, kept.len());
        }
        kept.push(style);
    }

    *styles = kept;
    let after = styles.len();

    if replaced + duplicates > 0 {
        log::debug!("Deduplicated backup: {} replaced, {} duplicates", replaced, duplicates);
    }

    DedupeStats {
        before,
        after,
        replaced,
        duplicates,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_core::types::Section;

    fn style(id: Option<StyleId>, name: &str, code: &str) -> Style {
        let mut style = Style::new(0, name).with_section(Section::global(code));
        style.id = id;
        style
    }

    #[test]
    fn later_id_wins_in_place() {
        let mut styles = vec![
            style(Some(1), "a", "old"),
            style(Some(2), "b", "x"),
            style(Some(1), "a", "new"),
        ];
        let stats = dedupe_styles(&mut styles);
        assert_eq!(stats.replaced, 1);
        assert_eq!(stats.after, 2);
        assert_eq!(styles[0].sections[0].code, "new");
        assert_eq!(styles[1].name, "b");
    }

    #[test]
    fn exact_copies_are_dropped() {
        let mut styles = vec![
            style(None, "a", "x"),
            style(None, "a", "x"),
            style(None, "a", "y"),
            style(None, "b", "x"),
        ];
        let stats = dedupe_styles(&mut styles);
        assert_eq!(
            stats,
            DedupeStats {
                before: 4,
                after: 3,
                replaced: 0,
                duplicates: 1
            }
        );
    }
}
