//! Core type definitions for StyleMatch
//!
//! These are the records the extension hands to the engine and the shapes
//! the engine hands back. All of them serialize to plain maps and lists so
//! they survive a trip through the extension's messaging layer.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Stable style identity, assigned by storage on first persist.
pub type StyleId = u32;

// =============================================================================
// Target Rules
// =============================================================================

/// Which list a target rule lives in. The list decides how the rule's
/// string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleKind {
    /// Exact URL
    Url,
    /// URL prefix
    UrlPrefix,
    /// Hostname or any of its subdomains
    Domain,
    /// Regular expression searched anywhere in the URL
    Regexp,
}

impl RuleKind {
    pub const ALL: [RuleKind; 4] = [Self::Url, Self::UrlPrefix, Self::Domain, Self::Regexp];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::UrlPrefix => "url-prefix",
            Self::Domain => "domain",
            Self::Regexp => "regexp",
        }
    }
}

bitflags::bitflags! {
    /// Which target lists a section actually carries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TargetKinds: u8 {
        const URLS = 1 << 0;
        const URL_PREFIXES = 1 << 1;
        const DOMAINS = 1 << 2;
        const REGEXPS = 1 << 3;
        /// Kinds that can be checked without running a regex
        const CHEAP = Self::URLS.bits() | Self::URL_PREFIXES.bits() | Self::DOMAINS.bits();
    }
}

impl From<RuleKind> for TargetKinds {
    fn from(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Url => Self::URLS,
            RuleKind::UrlPrefix => Self::URL_PREFIXES,
            RuleKind::Domain => Self::DOMAINS,
            RuleKind::Regexp => Self::REGEXPS,
        }
    }
}

// =============================================================================
// Style / Section
// =============================================================================

/// A CSS payload plus the target rules under which it is injected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Section {
    pub code: String,
    pub urls: Vec<String>,
    pub url_prefixes: Vec<String>,
    pub domains: Vec<String>,
    pub regexps: Vec<String>,
}

impl Section {
    /// A section with no target rules at all. It matches every URL.
    pub fn global(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn rules(&self, kind: RuleKind) -> &[String] {
        match kind {
            RuleKind::Url => &self.urls,
            RuleKind::UrlPrefix => &self.url_prefixes,
            RuleKind::Domain => &self.domains,
            RuleKind::Regexp => &self.regexps,
        }
    }

    pub fn target_kinds(&self) -> TargetKinds {
        RuleKind::ALL
            .into_iter()
            .filter(|&kind| !self.rules(kind).is_empty())
            .fold(TargetKinds::empty(), |acc, kind| acc | kind.into())
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.target_kinds().is_empty()
    }

    /// True when the payload holds nothing but whitespace and comments.
    pub fn code_is_empty(&self) -> bool {
        let mut rest = self.code.trim_start();
        while let Some(body) = rest.strip_prefix("/*") {
            match body.find("*/") {
                Some(end) => rest = body[end + 2..].trim_start(),
                None => return true,
            }
        }
        rest.is_empty()
    }
}

/// Color-scheme gating of a style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferScheme {
    #[default]
    None,
    Dark,
    Light,
}

/// Per-style injection-order override.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionOverride {
    /// Forces the style into the priority group
    pub top: bool,
    /// Explicit rank within its group
    pub rank: Option<i64>,
}

/// A user style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StyleId>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub prefer_scheme: PreferScheme,
    #[serde(default)]
    pub injection: InjectionOverride,
    #[serde(default)]
    pub exclusions: Vec<String>,
    #[serde(default)]
    pub inclusions: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl Style {
    pub fn new(id: StyleId, name: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            enabled: true,
            name: name.into(),
            custom_name: None,
            sections: Vec::new(),
            prefer_scheme: PreferScheme::None,
            injection: InjectionOverride::default(),
            exclusions: Vec::new(),
            inclusions: Vec::new(),
        }
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Name shown to the user and used for ordering.
    pub fn display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }
}

// =============================================================================
// Match Result
// =============================================================================

/// Result of matching one URL against every style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Style id -> ascending indices of its matching sections
    pub sections: BTreeMap<StyleId, Vec<usize>>,
    /// Styles with sections whose regexps were not evaluated yet. A style
    /// may also have confirmed sections listed in `sections`.
    pub maybe_match: BTreeSet<StyleId>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty() && self.maybe_match.is_empty()
    }

    /// Does this result mention `id` in either set?
    pub fn references(&self, id: StyleId) -> bool {
        self.sections.contains_key(&id) || self.maybe_match.contains(&id)
    }

    pub fn style_ids(&self) -> impl Iterator<Item = StyleId> + '_ {
        self.sections.keys().copied()
    }

    /// Drop every trace of `id`. Returns true if anything was removed.
    pub fn forget(&mut self, id: StyleId) -> bool {
        let had_sections = self.sections.remove(&id).is_some();
        let had_maybe = self.maybe_match.remove(&id);
        had_sections || had_maybe
    }
}

/// Pointer to one section of one style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRef {
    pub style_id: StyleId,
    pub index: usize,
}

/// Per-style view of a URL for the popup: why a style does or does not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleMatchInfo {
    pub style_id: StyleId,
    pub enabled: bool,
    /// URL hit one of the style's exclusions
    pub excluded: bool,
    /// Style's preferred color scheme is not active
    pub excluded_scheme: bool,
    /// URL hit one of the style's inclusions
    pub included: bool,
    /// Every matching section has blank code
    pub empty: bool,
    /// A regexp could only be confirmed by a deferred check
    pub uncertain: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kinds() {
        let section = Section {
            domains: vec!["example.com".into()],
            regexps: vec![".*".into()],
            ..Section::default()
        };
        assert_eq!(section.target_kinds(), TargetKinds::DOMAINS | TargetKinds::REGEXPS);
        assert!(!section.is_global());
        assert!(Section::global("a{}").is_global());
    }

    #[test]
    fn test_code_is_empty() {
        assert!(Section::global("").code_is_empty());
        assert!(Section::global("  /* note */ \n /**/ ").code_is_empty());
        assert!(Section::global("/* unterminated").code_is_empty());
        assert!(!Section::global("/* x */ body { color: red }").code_is_empty());
    }

    #[test]
    fn test_style_json_shape() {
        let json = r#"{
            "id": 7,
            "name": "Dark",
            "sections": [{"code": "a{}", "urlPrefixes": ["https://x.org/"]}],
            "preferScheme": "dark",
            "injection": {"top": true}
        }"#;
        let style: Style = serde_json::from_str(json).expect("style should parse");
        assert_eq!(style.id, Some(7));
        assert!(style.enabled);
        assert_eq!(style.sections[0].url_prefixes, vec!["https://x.org/".to_string()]);
        assert!(style.sections[0].urls.is_empty());
        assert_eq!(style.prefer_scheme, PreferScheme::Dark);
        assert!(style.injection.top);
        assert_eq!(style.injection.rank, None);
    }

    #[test]
    fn test_display_name_prefers_custom() {
        let mut style = Style::new(1, "Original");
        assert_eq!(style.display_name(), "Original");
        style.custom_name = Some("Mine".into());
        assert_eq!(style.display_name(), "Mine");
        style.custom_name = Some(String::new());
        assert_eq!(style.display_name(), "Original");
    }

    #[test]
    fn test_match_result_round_trips_through_json() {
        let mut result = MatchResult::default();
        result.sections.insert(3, vec![0, 2]);
        result.maybe_match.insert(9);
        let json = serde_json::to_string(&result).expect("serialize");
        let back: MatchResult = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, result);
        assert!(back.references(9));
        assert!(!back.references(4));
    }
}
