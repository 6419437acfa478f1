//! Style index
//!
//! Holds every known style with its compiled patterns, plus a host lookup
//! used to pre-filter candidates before full matching. The lookup may
//! over-include but never misses a style that could match.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::{IndexError, PatternError, PatternSource};
use crate::pattern::Glob;
use crate::section::CompiledSection;
use crate::types::{Section, Style, StyleId};
use crate::url::{extract_host, extract_prefix_host, walk_host_suffixes};

// =============================================================================
// Indexed Style
// =============================================================================

/// A pattern error together with the section it came from. Style-level
/// globs have no section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedPatternError {
    pub section: Option<usize>,
    pub error: PatternError,
}

/// A style plus everything derived from it at ingestion.
#[derive(Debug, Clone)]
pub struct IndexedStyle {
    style: Style,
    sections: Vec<CompiledSection>,
    exclusions: Vec<Glob>,
    inclusions: Vec<Glob>,
    pattern_errors: Vec<LocatedPatternError>,
    host_keys: BTreeSet<Box<str>>,
    always: bool,
}

impl IndexedStyle {
    fn build(style: Style) -> Self {
        let mut pattern_errors = Vec::new();

        let sections = style
            .sections
            .iter()
            .enumerate()
            .map(|(i, section)| {
                let (compiled, errors) = CompiledSection::compile(section);
                pattern_errors.extend(errors.into_iter().map(|error| LocatedPatternError {
                    section: Some(i),
                    error,
                }));
                compiled
            })
            .collect();

        let mut globs = |texts: &[String], kind: PatternSource| -> Vec<Glob> {
            texts
                .iter()
                .filter_map(|text| match Glob::compile(text, kind) {
                    Ok(glob) => Some(glob),
                    Err(error) => {
                        pattern_errors.push(LocatedPatternError { section: None, error });
                        None
                    }
                })
                .collect()
        };
        let exclusions = globs(&style.exclusions, PatternSource::Exclusion);
        let inclusions = globs(&style.inclusions, PatternSource::Inclusion);

        let (host_keys, always) = host_keys_of(&style);

        Self {
            style,
            sections,
            exclusions,
            inclusions,
            pattern_errors,
            host_keys,
            always,
        }
    }

    #[inline]
    pub fn style(&self) -> &Style {
        &self.style
    }

    #[inline]
    pub fn id(&self) -> StyleId {
        self.style.id.unwrap_or_default()
    }

    /// Sections with their compiled form, by index.
    pub fn sections(&self) -> impl Iterator<Item = (usize, &Section, &CompiledSection)> + '_ {
        self.style
            .sections
            .iter()
            .zip(&self.sections)
            .enumerate()
            .map(|(i, (section, compiled))| (i, section, compiled))
    }

    /// Patterns that failed to compile. They never match.
    pub fn pattern_errors(&self) -> &[LocatedPatternError] {
        &self.pattern_errors
    }

    pub fn is_excluded(&self, url: &str) -> bool {
        self.exclusions.iter().any(|glob| glob.matches(url))
    }

    pub fn is_included(&self, url: &str) -> bool {
        self.inclusions.iter().any(|glob| glob.matches(url))
    }

    /// Whether this style is a candidate for every URL.
    #[inline]
    pub fn is_always_candidate(&self) -> bool {
        self.always
    }
}

/// Host keys a style can be found under, and whether it must instead be
/// considered for every URL.
fn host_keys_of(style: &Style) -> (BTreeSet<Box<str>>, bool) {
    let mut keys = BTreeSet::new();
    let mut always = !style.inclusions.is_empty();

    for section in &style.sections {
        if section.is_global() || !section.regexps.is_empty() {
            always = true;
            continue;
        }
        for domain in &section.domains {
            if domain.is_empty() {
                always = true;
            } else {
                keys.insert(host_key(domain));
            }
        }
        let hosts = section
            .urls
            .iter()
            .map(|url| extract_host(url).filter(|host| !host.is_empty()))
            .chain(section.url_prefixes.iter().map(|prefix| extract_prefix_host(prefix)));
        for host in hosts {
            match host {
                Some(host) => {
                    keys.insert(host_key(host));
                }
                None => always = true,
            }
        }
    }

    if always {
        keys.clear();
    }
    (keys, always)
}

/// Hosts are keyed ASCII-lowercased, matching `candidates_for`.
fn host_key(host: &str) -> Box<str> {
    host.to_ascii_lowercase().into_boxed_str()
}

// =============================================================================
// StyleIndex
// =============================================================================

#[derive(Debug, Default)]
pub struct StyleIndex {
    styles: BTreeMap<StyleId, IndexedStyle>,
    by_host: HashMap<Box<str>, BTreeSet<StyleId>>,
    always: BTreeSet<StyleId>,
}

impl StyleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a new style. Malformed patterns are recorded on the entry; the
    /// style is still accepted.
    pub fn add(&mut self, style: Style) -> Result<&IndexedStyle, IndexError> {
        let id = style.id.ok_or(IndexError::MissingId)?;
        if self.styles.contains_key(&id) {
            return Err(IndexError::DuplicateId(id));
        }
        Ok(self.insert(id, style))
    }

    /// Replace an indexed style. Returns the previous entry.
    pub fn update(&mut self, style: Style) -> Result<IndexedStyle, IndexError> {
        let id = style.id.ok_or(IndexError::MissingId)?;
        let previous = self.remove(id)?;
        self.insert(id, style);
        Ok(previous)
    }

    pub fn remove(&mut self, id: StyleId) -> Result<IndexedStyle, IndexError> {
        let entry = self.styles.remove(&id).ok_or(IndexError::UnknownId(id))?;
        if entry.always {
            self.always.remove(&id);
        }
        for key in &entry.host_keys {
            if let Some(ids) = self.by_host.get_mut(key) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.by_host.remove(key);
                }
            }
        }
        Ok(entry)
    }

    #[inline]
    pub fn get(&self, id: StyleId) -> Option<&IndexedStyle> {
        self.styles.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: StyleId) -> bool {
        self.styles.contains_key(&id)
    }

    /// Every indexed style, ascending by id.
    pub fn all(&self) -> impl Iterator<Item = &IndexedStyle> + '_ {
        self.styles.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.styles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// Ids of styles that may match `url`, ascending.
    pub fn candidates_for(&self, url: &str) -> Vec<StyleId> {
        let mut ids = self.always.clone();
        if let Some(host) = extract_host(url) {
            let host = host.to_ascii_lowercase();
            for suffix in walk_host_suffixes(&host) {
                if let Some(found) = self.by_host.get(suffix) {
                    ids.extend(found.iter().copied());
                }
            }
        }
        ids.into_iter().collect()
    }

    /// Number of distinct host keys in the lookup.
    pub fn host_key_count(&self) -> usize {
        self.by_host.len()
    }

    /// Number of styles considered for every URL.
    pub fn always_count(&self) -> usize {
        self.always.len()
    }

    fn insert(&mut self, id: StyleId, style: Style) -> &IndexedStyle {
        let entry = IndexedStyle::build(style);
        if entry.always {
            self.always.insert(id);
        }
        for key in &entry.host_keys {
            self.by_host.entry(key.clone()).or_default().insert(id);
        }
        self.styles.entry(id).or_insert(entry)
    }
}
