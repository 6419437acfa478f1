use serde_json::Value;

use sm_core::order::InjectionOrder;
use sm_core::types::{Style, StyleId};

use crate::ImportError;

/// Key of the settings entry a backup may carry alongside its styles.
pub const SETTINGS_KEY: &str = "settings";

/// An entry that could not become a style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidEntry {
    /// Position in the backup array
    pub index: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedBackup {
    pub styles: Vec<Style>,
    pub invalid: Vec<InvalidEntry>,
    /// Settings entries, which this importer does not apply
    pub skipped: usize,
    /// Injection order carried by the settings entry, if any
    pub order: Option<InjectionOrder>,
}

pub fn parse_backup(text: &str) -> Result<ParsedBackup, ImportError> {
    let root: Value = serde_json::from_str(text)?;
    let Value::Array(entries) = root else {
        return Err(ImportError::NotAnArray);
    };

    let mut parsed = ParsedBackup::default();

    for (index, entry) in entries.into_iter().enumerate() {
        if is_settings_entry(&entry) {
            parsed.skipped += 1;
            if let Some(order) = entry.get("order").and_then(parse_order) {
                parsed.order = Some(order);
            }
            continue;
        }

        let name = entry.get("name").and_then(Value::as_str).unwrap_or_default().trim().to_string();

        if !seems_like_style(&entry) {
            parsed.invalid.push(InvalidEntry {
                index,
                name,
                reason: "not a style".into(),
            });
            continue;
        }

        match serde_json::from_value::<Style>(entry) {
            Ok(mut style) => {
                style.name = name;
                parsed.styles.push(style);
            }
            Err(e) => parsed.invalid.push(InvalidEntry {
                index,
                name,
                reason: e.to_string(),
            }),
        }
    }

    log::info!(
        "Parsed backup: {} styles, {} invalid, {} skipped",
        parsed.styles.len(),
        parsed.invalid.len(),
        parsed.skipped
    );

    Ok(parsed)
}

fn is_settings_entry(entry: &Value) -> bool {
    entry.get(SETTINGS_KEY).is_some() && entry.get("sections").is_none()
}

/// Non-blank name, a sections array, and string code in the first section.
fn seems_like_style(entry: &Value) -> bool {
    let named = entry
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    let first_code = entry
        .get("sections")
        .and_then(Value::as_array)
        .and_then(|sections| sections.first())
        .and_then(|section| section.get("code"))
        .is_some_and(Value::is_string);
    named && first_code
}

/// `{"main": [ids], "prio": [ids]}` with list position as rank.
fn parse_order(value: &Value) -> Option<InjectionOrder> {
    let ids = |group: &str| -> Vec<StyleId> {
        value
            .get(group)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|id| StyleId::try_from(id).ok())
                    .collect()
            })
            .unwrap_or_default()
    };
    match InjectionOrder::from_lists(&ids("main"), &ids("prio")) {
        Ok(order) => Some(order),
        Err(e) => {
            log::warn!("Ignoring injection order in backup: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_styles_and_counts_the_rest() {
        let text = r#"[
            {"id": 1, "name": "  Dark  ", "sections": [{"code": "a{}", "domains": ["a.com"]}]},
            {"settings": {"popup.width": 300}, "order": {"main": [1], "prio": []}},
            {"name": "", "sections": [{"code": ""}]},
            {"name": "no code", "sections": [{}]},
            {"name": "bad types", "sections": [{"code": "x", "urls": "not-a-list"}]},
            42
        ]"#;
        let parsed = parse_backup(text).expect("backup parses");

        assert_eq!(parsed.styles.len(), 1);
        assert_eq!(parsed.styles[0].name, "Dark");
        assert_eq!(parsed.styles[0].sections[0].domains, vec!["a.com".to_string()]);
        assert_eq!(parsed.skipped, 1);
        assert_eq!(parsed.order.as_ref().and_then(|o| o.main.get(&1)), Some(&1));

        let invalid: Vec<usize> = parsed.invalid.iter().map(|e| e.index).collect();
        assert_eq!(invalid, vec![2, 3, 4, 5]);
        assert_eq!(parsed.invalid[2].name, "bad types");
        assert_ne!(parsed.invalid[2].reason, "not a style");
    }

    #[test]
    fn rejects_non_arrays() {
        assert!(matches!(parse_backup("{}"), Err(ImportError::NotAnArray)));
        assert!(matches!(parse_backup("[1,"), Err(ImportError::Json(_))));
    }

    #[test]
    fn conflicting_order_is_dropped() {
        let text = r#"[{"settings": {}, "order": {"main": [1], "prio": [1]}}]"#;
        let parsed = parse_backup(text).expect("backup parses");
        assert_eq!(parsed.skipped, 1);
        assert!(parsed.order.is_none());
    }
}
