//! Section matching
//!
//! A section applies when it is global (no target rules) or when any one of
//! its rules matches. Cheap rule kinds are tried before regexps, and under
//! `RegexpMode::Deferred` regexps are not run at all: the section is then
//! reported as uncertain and confirmed later by a second pass.

use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::pattern::{self, prefix_rule_matches, url_rule_matches, CompiledRegexp};
use crate::types::{RuleKind, Section, TargetKinds};
use crate::url::{extract_host, host_matches_domain};

/// When regexp rules are evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegexpMode {
    /// Evaluate regexps while matching.
    #[default]
    Eager,
    /// Leave regexp-only hits as `maybe_match` for a second pass.
    Deferred,
}

/// Outcome of matching one section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionMatch {
    pub applies: bool,
    /// A regexp could still match but was not evaluated
    pub uncertain: bool,
}

impl SectionMatch {
    pub const YES: Self = Self { applies: true, uncertain: false };
    pub const NO: Self = Self { applies: false, uncertain: false };
    pub const MAYBE: Self = Self { applies: false, uncertain: true };
}

/// A URL prepared for matching against many sections.
#[derive(Debug, Clone, Copy)]
pub struct MatchQuery<'a> {
    pub url: &'a str,
    pub host: Option<&'a str>,
    /// The URL belongs to the extension itself
    pub is_own_page: bool,
}

impl<'a> MatchQuery<'a> {
    pub fn new(url: &'a str, own_root: Option<&str>) -> Self {
        Self {
            url,
            host: extract_host(url),
            is_own_page: own_root.is_some_and(|root| !root.is_empty() && url.starts_with(root)),
        }
    }
}

/// A section's regexps compiled once at ingestion.
#[derive(Debug, Clone)]
pub struct CompiledSection {
    kinds: TargetKinds,
    regexps: Vec<CompiledRegexp>,
}

impl CompiledSection {
    /// Compile every regexp of `section`. Malformed ones are dropped from
    /// the compiled form and returned alongside it.
    pub fn compile(section: &Section) -> (Self, Vec<PatternError>) {
        let mut regexps = Vec::with_capacity(section.regexps.len());
        let mut errors = Vec::new();
        for pattern in &section.regexps {
            match CompiledRegexp::compile(pattern) {
                Ok(re) => regexps.push(re),
                Err(e) => errors.push(e),
            }
        }
        let compiled = Self {
            kinds: section.target_kinds(),
            regexps,
        };
        (compiled, errors)
    }

    #[inline]
    pub fn kinds(&self) -> TargetKinds {
        self.kinds
    }

    #[inline]
    pub fn is_global(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Decide whether `section` applies to the query.
pub fn evaluate(
    section: &Section,
    compiled: &CompiledSection,
    query: &MatchQuery<'_>,
    mode: RegexpMode,
) -> SectionMatch {
    if compiled.is_global() {
        // Own pages only get styles that target them on purpose
        return if query.is_own_page { SectionMatch::NO } else { SectionMatch::YES };
    }

    if matches_cheap(section, query) {
        return SectionMatch::YES;
    }

    let mut eligible = compiled
        .regexps
        .iter()
        .filter(|re| !query.is_own_page || re.mentions_extension())
        .peekable();

    if eligible.peek().is_none() {
        return SectionMatch::NO;
    }

    match mode {
        RegexpMode::Deferred => SectionMatch::MAYBE,
        RegexpMode::Eager => {
            if eligible.any(|re| re.is_match(query.url)) {
                SectionMatch::YES
            } else {
                SectionMatch::NO
            }
        }
    }
}

fn matches_cheap(section: &Section, query: &MatchQuery<'_>) -> bool {
    if let Some(host) = query.host {
        if section.domains.iter().any(|d| host_matches_domain(host, d)) {
            return true;
        }
    }
    section.url_prefixes.iter().any(|p| prefix_rule_matches(p, query.url))
        || section.urls.iter().any(|u| url_rule_matches(u, query.url))
}

/// Stateless form: does `section` apply to `url`? Regexps are compiled on
/// the spot and malformed ones never match.
pub fn section_applies(section: &Section, url: &str) -> bool {
    section.is_global()
        || RuleKind::ALL
            .into_iter()
            .any(|kind| section.rules(kind).iter().any(|value| pattern::matches(kind, value, url)))
}
