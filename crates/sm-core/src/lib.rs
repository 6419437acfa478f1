//! StyleMatch Core Library
//!
//! This crate decides which user-style sections apply to a page URL, caches
//! the answer per URL, keeps that cache coherent as styles are edited, and
//! emits matched sections in a stable injection order.
//!
//! # Architecture
//!
//! Styles are compiled once when they enter the `StyleIndex`: regexps and
//! exclusion globs are built, and each style is filed under the hosts it
//! can target. A query pre-filters candidates by walking the URL's host
//! suffixes, runs the section matcher over the survivors, and stores the
//! result in a bounded FIFO cache.
//!
//! # Modules
//!
//! - `pattern`: Single target rules and style-level globs
//! - `section`: Section matching, including deferred regexps
//! - `cache`: Bounded FIFO cache with an eviction hook
//! - `index`: Compiled styles and host lookup
//! - `engine`: Cached matching and invalidation on style mutation
//! - `order`: Two-group injection ordering
//! - `differ`: Does an edit change matching?
//! - `host`: Collaborators supplied by the extension
//! - `config`: Engine configuration
//! - `url`: Allocation-free URL slicing

pub mod cache;
pub mod config;
pub mod differ;
pub mod engine;
pub mod error;
pub mod host;
pub mod index;
pub mod order;
pub mod pattern;
pub mod section;
pub mod shared;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use cache::BoundedCache;
pub use config::EngineConfig;
pub use differ::{matching_changed, style_sections_equal};
pub use engine::{EngineStats, MatchEngine};
pub use error::{ConfigError, EngineError, IndexError, OrderError, PatternError, PatternSource};
pub use host::{AnyScheme, ErrorContext, ErrorReporter, FixedScheme, LogReporter, SchemePolicy, StripFragment, UrlNormalizer};
pub use index::StyleIndex;
pub use order::{Group, InjectionOrder};
pub use section::{section_applies, RegexpMode};
pub use shared::SharedEngine;
pub use types::{
    InjectionOverride, MatchResult, PreferScheme, RuleKind, Section, SectionRef, Style, StyleId, StyleMatchInfo,
};
