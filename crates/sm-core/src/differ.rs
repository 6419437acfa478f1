//! Structural style comparison
//!
//! Decides whether an edit can change which sections match which URLs, so
//! the engine leaves the cache alone for renames and code-only edits.

use std::collections::BTreeSet;

use crate::types::{RuleKind, Section, Style};

/// Same number of sections, pairwise equal code and equal target lists.
/// Target lists compare as sets of the same length; an empty list equals a
/// missing one.
pub fn style_sections_equal(a: &Style, b: &Style) -> bool {
    a.sections.len() == b.sections.len()
        && a
            .sections
            .iter()
            .zip(&b.sections)
            .all(|(x, y)| x.code == y.code && same_targets(x, y))
}

/// Could switching from `prev` to `next` change any match result?
///
/// Code, name and injection-order edits cannot.
pub fn matching_changed(prev: &Style, next: &Style) -> bool {
    prev.enabled != next.enabled
        || prev.prefer_scheme != next.prefer_scheme
        || !same_list(&prev.exclusions, &next.exclusions)
        || !same_list(&prev.inclusions, &next.inclusions)
        || prev.sections.len() != next.sections.len()
        || prev
            .sections
            .iter()
            .zip(&next.sections)
            .any(|(x, y)| !same_targets(x, y))
}

fn same_targets(a: &Section, b: &Section) -> bool {
    RuleKind::ALL
        .into_iter()
        .all(|kind| same_list(a.rules(kind), b.rules(kind)))
}

fn same_list(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let left: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let right: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    left == right
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> Style {
        Style::new(1, "Base")
            .with_section(Section {
                code: "a { color: red }".into(),
                domains: vec!["a.com".into(), "b.com".into()],
                ..Section::default()
            })
            .with_section(Section::global(""))
    }

    #[test]
    fn test_target_order_does_not_matter() {
        let a = style();
        let mut b = style();
        b.sections[0].domains.reverse();
        assert!(style_sections_equal(&a, &b));
        assert!(!matching_changed(&a, &b));
    }

    #[test]
    fn test_code_only_edit() {
        let a = style();
        let mut b = style();
        b.sections[0].code = "a { color: blue }".into();
        assert!(!style_sections_equal(&a, &b));
        assert!(!matching_changed(&a, &b));
    }

    #[test]
    fn test_meta_only_edits_keep_matching() {
        let a = style();
        let mut b = style();
        b.name = "Renamed".into();
        b.custom_name = Some("Mine".into());
        b.injection.top = true;
        b.injection.rank = Some(3);
        assert!(style_sections_equal(&a, &b));
        assert!(!matching_changed(&a, &b));
    }

    #[test]
    fn test_matching_edits() {
        let a = style();

        let mut b = style();
        b.sections[0].domains.push("c.com".into());
        assert!(matching_changed(&a, &b));
        assert!(!style_sections_equal(&a, &b));

        let mut b = style();
        b.enabled = false;
        assert!(matching_changed(&a, &b));

        let mut b = style();
        b.exclusions.push("*://a.com/*".into());
        assert!(matching_changed(&a, &b));

        let mut b = style();
        b.sections.pop();
        assert!(matching_changed(&a, &b));
    }

    #[test]
    fn test_duplicates_count() {
        let mut a = style();
        let mut b = style();
        a.sections[0].domains = vec!["a.com".into(), "a.com".into()];
        b.sections[0].domains = vec!["a.com".into()];
        assert!(!style_sections_equal(&a, &b));
    }
}
