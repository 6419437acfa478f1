//! Match engine
//!
//! Answers "which sections apply to this URL" from a FIFO cache of match
//! results, computing misses from the style index. Style mutations keep
//! the cache coherent: removals drop every entry that mentions the style,
//! additions are patched into the existing entries in place.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::cache::{BoundedCache, EvictionHook};
use crate::config::EngineConfig;
use crate::differ::matching_changed;
use crate::error::{EngineError, IndexError, OrderError, PatternSource};
use crate::host::{AnyScheme, ErrorContext, ErrorReporter, LogReporter, SchemePolicy, StripFragment, UrlNormalizer};
use crate::index::{IndexedStyle, LocatedPatternError, StyleIndex};
use crate::order::{self, InjectionOrder};
use crate::section::{evaluate, MatchQuery, RegexpMode};
use crate::types::{MatchResult, Section, SectionRef, Style, StyleId, StyleMatchInfo};

/// Key under which a pattern error has already been reported.
type ReportKey = (StyleId, Option<usize>, PatternSource, String);

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub styles: usize,
    pub always_candidates: usize,
    pub host_keys: usize,
    pub cached_urls: usize,
    pub cache_capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// How one style relates to one URL.
enum Outcome {
    /// Confirmed sections, and whether deferred regexps may add more
    Sections(Vec<usize>, bool),
    Maybe,
    Miss,
}

impl Outcome {
    /// Write this outcome for `id` into a result that holds no trace of it.
    fn record(self, id: StyleId, result: &mut MatchResult) {
        match self {
            Outcome::Sections(sections, uncertain) => {
                result.sections.insert(id, sections);
                if uncertain {
                    result.maybe_match.insert(id);
                }
            }
            Outcome::Maybe => {
                result.maybe_match.insert(id);
            }
            Outcome::Miss => {}
        }
    }
}

// =============================================================================
// MatchEngine
// =============================================================================

pub struct MatchEngine {
    config: EngineConfig,
    index: StyleIndex,
    cache: BoundedCache<String, Arc<MatchResult>>,
    order: InjectionOrder,
    reporter: Box<dyn ErrorReporter>,
    normalizer: Box<dyn UrlNormalizer>,
    scheme: Box<dyn SchemePolicy>,
    reported: HashSet<ReportKey>,
    hits: u64,
    misses: u64,
}

impl MatchEngine {
    pub fn new(config: EngineConfig) -> Self {
        let normalizer = StripFragment {
            keep_fragment: config.keep_fragment,
        };
        Self {
            cache: BoundedCache::new(config.cache_capacity),
            config,
            index: StyleIndex::new(),
            order: InjectionOrder::default(),
            reporter: Box::new(LogReporter),
            normalizer: Box::new(normalizer),
            scheme: Box::new(AnyScheme),
            reported: HashSet::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Box<dyn UrlNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_scheme_policy(mut self, scheme: Box<dyn SchemePolicy>) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_on_evicted(mut self, hook: EvictionHook<String, Arc<MatchResult>>) -> Self {
        self.cache.set_on_evicted(Some(hook));
        self
    }

    /// Swap the scheme policy, e.g. when the OS switches to dark mode.
    /// Every cached result may change, so the cache is cleared.
    pub fn set_scheme_policy(&mut self, scheme: Box<dyn SchemePolicy>) {
        self.scheme = scheme;
        self.invalidate_all();
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Sections matching `url`, served from the cache when possible.
    pub fn get_matches(&mut self, url: &str) -> Arc<MatchResult> {
        let key = self.normalizer.normalize(url);
        if let Some(hit) = self.cache.get(&key) {
            self.hits += 1;
            return Arc::clone(hit);
        }

        self.misses += 1;
        let result = Arc::new(self.compute(&key, self.config.regexp_mode));
        log::debug!(
            "Cache miss for {}: {} styles, {} deferred",
            key,
            result.sections.len(),
            result.maybe_match.len()
        );
        self.cache.set(key, Arc::clone(&result));
        result
    }

    /// Matching sections of `url` in injection order. Without an explicit
    /// descriptor the engine's own injection order is used.
    pub fn get_ordered_matches(&mut self, url: &str, descriptor: Option<&InjectionOrder>) -> Vec<SectionRef> {
        let result = self.get_matches(url);
        order::order(&result, Some(descriptor.unwrap_or(&self.order)), &self.index)
    }

    /// Confirm the deferred regexp candidates of `url`. Each uncertain style
    /// is evaluated in full and its section list replaced; styles with no
    /// matching section are dropped. The cache entry is replaced in place.
    pub fn resolve_deferred(&mut self, url: &str) -> Arc<MatchResult> {
        let current = self.get_matches(url);
        if current.maybe_match.is_empty() {
            return current;
        }

        let key = self.normalizer.normalize(url);
        let query = MatchQuery::new(&key, self.config.own_root());
        let mut resolved = (*current).clone();
        for id in std::mem::take(&mut resolved.maybe_match) {
            let outcome = self
                .index
                .get(id)
                .map_or(Outcome::Miss, |entry| style_outcome(entry, &query, RegexpMode::Eager, &*self.scheme));
            match outcome {
                Outcome::Sections(sections, _) => {
                    resolved.sections.insert(id, sections);
                }
                _ => {
                    resolved.sections.remove(&id);
                }
            }
        }

        let resolved = Arc::new(resolved);
        if let Some(slot) = self.cache.get_mut(&key) {
            *slot = Arc::clone(&resolved);
        }
        resolved
    }

    /// Ids of every style applied to a page and its frames.
    pub fn frame_style_ids<I, S>(&mut self, urls: I) -> BTreeSet<StyleId>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ids = BTreeSet::new();
        for url in urls {
            ids.extend(self.get_matches(url.as_ref()).style_ids());
        }
        ids
    }

    /// Uncached per-style view of `url`, including styles that are
    /// disabled, excluded or hidden by the color scheme.
    pub fn inspect_url(&self, url: &str) -> Vec<StyleMatchInfo> {
        let url = self.normalizer.normalize(url);
        let query = MatchQuery::new(&url, self.config.own_root());

        self.index
            .candidates_for(&url)
            .into_iter()
            .filter_map(|id| self.index.get(id))
            .filter_map(|entry| {
                let style = entry.style();
                let included = entry.is_included(&url);
                let (sections, uncertain) = matched_sections(entry, &query, self.config.regexp_mode);
                if sections.is_empty() && !uncertain {
                    return None;
                }
                Some(StyleMatchInfo {
                    style_id: entry.id(),
                    enabled: style.enabled,
                    excluded: entry.is_excluded(&url),
                    excluded_scheme: !self.scheme.allows(style.prefer_scheme),
                    included,
                    empty: !sections.is_empty() && sections.iter().all(|&i| style.sections[i].code_is_empty()),
                    uncertain,
                })
            })
            .collect()
    }

    pub fn section(&self, at: SectionRef) -> Option<&Section> {
        self.style(at.style_id)?.sections.get(at.index)
    }

    pub fn style(&self, id: StyleId) -> Option<&Style> {
        self.index.get(id).map(IndexedStyle::style)
    }

    pub fn styles(&self) -> impl Iterator<Item = &Style> + '_ {
        self.index.all().map(IndexedStyle::style)
    }

    /// Cached URLs from oldest to newest.
    pub fn cached_urls(&self) -> impl Iterator<Item = &str> + '_ {
        self.cache.iter().map(|(url, _)| url.as_str())
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            styles: self.index.len(),
            always_candidates: self.index.always_count(),
            host_keys: self.index.host_key_count(),
            cached_urls: self.cache.len(),
            cache_capacity: self.cache.capacity(),
            hits: self.hits,
            misses: self.misses,
            evictions: self.cache.evictions(),
        }
    }

    // =========================================================================
    // Injection Order
    // =========================================================================

    /// Replace the injection-order descriptor. A rejected descriptor leaves
    /// the previous one in place.
    pub fn set_injection_order(&mut self, descriptor: InjectionOrder) -> Result<(), OrderError> {
        descriptor.validate()?;
        self.order = descriptor;
        Ok(())
    }

    #[inline]
    pub fn injection_order(&self) -> &InjectionOrder {
        &self.order
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Drop every cached result that mentions `id`. Returns how many.
    pub fn invalidate(&mut self, id: StyleId) -> usize {
        let dropped = self.cache.retain(|_, result| !result.references(id));
        log::debug!("Invalidated {} cached URLs for style {}", dropped, id);
        dropped
    }

    pub fn invalidate_all(&mut self) {
        log::debug!("Clearing {} cached URLs", self.cache.len());
        self.cache.clear();
    }

    // =========================================================================
    // Mutation Notifications
    // =========================================================================

    /// Index a batch of styles at startup. The whole batch is checked
    /// first, so a rejected batch leaves the engine untouched. The cache is
    /// cleared once.
    pub fn load_styles(&mut self, styles: impl IntoIterator<Item = Style>) -> Result<usize, EngineError> {
        let styles: Vec<Style> = styles.into_iter().collect();
        let mut seen = HashSet::with_capacity(styles.len());
        for style in &styles {
            let id = style.id.ok_or(IndexError::MissingId)?;
            if self.index.contains(id) || !seen.insert(id) {
                return Err(IndexError::DuplicateId(id).into());
            }
        }

        let count = styles.len();
        for style in styles {
            let id = self.index.add(style)?.id();
            self.report_pattern_errors(id);
        }
        self.invalidate_all();
        log::info!("Loaded {} styles ({} total)", count, self.index.len());
        Ok(count)
    }

    pub fn on_style_created(&mut self, style: Style) -> Result<(), EngineError> {
        let id = style.id.ok_or(IndexError::MissingId)?;
        self.index.add(style)?;
        self.report_pattern_errors(id);
        self.refresh_style(id);
        Ok(())
    }

    /// Apply an edited style. The resident copy is the previous version;
    /// edits that cannot change matching leave the cache alone.
    pub fn on_style_updated(&mut self, style: Style) -> Result<(), EngineError> {
        let id = style.id.ok_or(IndexError::MissingId)?;
        let enabled = style.enabled;
        let previous = self.index.update(style)?;
        self.prune_reports(id);
        self.report_pattern_errors(id);

        let changed = self
            .index
            .get(id)
            .is_some_and(|next| matching_changed(previous.style(), next.style()));
        if !changed {
            return Ok(());
        }
        if enabled {
            self.refresh_style(id);
        } else {
            self.invalidate(id);
        }
        Ok(())
    }

    pub fn on_style_deleted(&mut self, id: StyleId) -> Result<(), EngineError> {
        self.index.remove(id)?;
        self.invalidate(id);
        self.order.remove_style(id);
        self.reported.retain(|key| key.0 != id);
        Ok(())
    }

    pub fn on_style_toggled(&mut self, id: StyleId, enabled: bool) -> Result<(), EngineError> {
        let mut style = self.style(id).cloned().ok_or(IndexError::UnknownId(id))?;
        if style.enabled == enabled {
            return Ok(());
        }
        style.enabled = enabled;
        self.index.update(style)?;
        if enabled {
            self.refresh_style(id);
        } else {
            self.invalidate(id);
        }
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn compute(&self, url: &str, mode: RegexpMode) -> MatchResult {
        let query = MatchQuery::new(url, self.config.own_root());
        let mut result = MatchResult::default();
        for id in self.index.candidates_for(url) {
            if let Some(entry) = self.index.get(id) {
                style_outcome(entry, &query, mode, &*self.scheme).record(id, &mut result);
            }
        }
        result
    }

    /// Re-evaluate one style against every cached URL and patch the
    /// entries in place.
    fn refresh_style(&mut self, id: StyleId) {
        let Some(entry) = self.index.get(id) else {
            return;
        };
        let own_root = self.config.own_root();
        let mode = self.config.regexp_mode;
        let mut patched = 0usize;

        for (url, result) in self.cache.iter_mut() {
            let query = MatchQuery::new(url, own_root);
            let outcome = style_outcome(entry, &query, mode, &*self.scheme);
            if matches!(outcome, Outcome::Miss) && !result.references(id) {
                continue;
            }
            let result = Arc::make_mut(result);
            result.forget(id);
            outcome.record(id, result);
            patched += 1;
        }
        log::debug!("Refreshed style {} in {} cached URLs", id, patched);
    }

    fn report_pattern_errors(&mut self, id: StyleId) {
        let Some(entry) = self.index.get(id) else {
            return;
        };
        for located in entry.pattern_errors() {
            if self.reported.insert(report_key(id, located)) {
                let context = ErrorContext {
                    style_id: id,
                    section: located.section,
                };
                self.reporter.report(&context, &located.error);
            }
        }
    }

    /// Forget reports for patterns `id` no longer carries, so a pattern
    /// that is fixed and later broken again is reported again.
    fn prune_reports(&mut self, id: StyleId) {
        let current: HashSet<ReportKey> = self
            .index
            .get(id)
            .map(|entry| entry.pattern_errors().iter().map(|located| report_key(id, located)).collect())
            .unwrap_or_default();
        self.reported.retain(|key| key.0 != id || current.contains(key));
    }
}

fn report_key(id: StyleId, located: &LocatedPatternError) -> ReportKey {
    (id, located.section, located.error.source_kind, located.error.pattern.clone())
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for MatchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchEngine")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Section indices of `entry` matching the query, ignoring enabled state,
/// exclusions and scheme. An inclusion hit selects every section.
fn matched_sections(entry: &IndexedStyle, query: &MatchQuery<'_>, mode: RegexpMode) -> (Vec<usize>, bool) {
    if entry.is_included(query.url) {
        return ((0..entry.style().sections.len()).collect(), false);
    }
    let mut sections = Vec::new();
    let mut uncertain = false;
    for (i, section, compiled) in entry.sections() {
        let hit = evaluate(section, compiled, query, mode);
        if hit.applies {
            sections.push(i);
        }
        uncertain |= hit.uncertain;
    }
    (sections, uncertain)
}

fn style_outcome(entry: &IndexedStyle, query: &MatchQuery<'_>, mode: RegexpMode, scheme: &dyn SchemePolicy) -> Outcome {
    let style = entry.style();
    if entry.is_excluded(query.url) || !style.enabled || !scheme.allows(style.prefer_scheme) {
        return Outcome::Miss;
    }
    match matched_sections(entry, query, mode) {
        (sections, uncertain) if !sections.is_empty() => Outcome::Sections(sections, uncertain),
        (_, true) => Outcome::Maybe,
        _ => Outcome::Miss,
    }
}
