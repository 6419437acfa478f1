//! Collaborators supplied by the hosting extension.

use crate::error::PatternError;
use crate::types::{PreferScheme, StyleId};
use crate::url::strip_fragment;

/// Where a reported pattern error was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorContext {
    pub style_id: StyleId,
    /// `None` for style-level exclusion/inclusion globs
    pub section: Option<usize>,
}

/// Receives malformed-pattern reports. Called at most once per pattern.
pub trait ErrorReporter: Send {
    fn report(&mut self, context: &ErrorContext, error: &PatternError);
}

/// Default reporter: a `log` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&mut self, context: &ErrorContext, error: &PatternError) {
        match context.section {
            Some(section) => log::warn!("Style {} section {}: {}", context.style_id, section, error),
            None => log::warn!("Style {}: {}", context.style_id, error),
        }
    }
}

/// Maps a page URL to the key it is matched and cached under.
pub trait UrlNormalizer: Send {
    fn normalize(&self, url: &str) -> String;
}

/// Default normalizer: drops the `#fragment`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StripFragment {
    pub keep_fragment: bool,
}

impl UrlNormalizer for StripFragment {
    fn normalize(&self, url: &str) -> String {
        if self.keep_fragment {
            url.to_string()
        } else {
            strip_fragment(url).to_string()
        }
    }
}

/// Decides whether a style's preferred color scheme is currently active.
pub trait SchemePolicy: Send {
    fn allows(&self, scheme: PreferScheme) -> bool;
}

/// Every style is allowed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnyScheme;

impl SchemePolicy for AnyScheme {
    fn allows(&self, _scheme: PreferScheme) -> bool {
        true
    }
}

/// A fixed dark or light mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixedScheme {
    pub dark: bool,
}

impl SchemePolicy for FixedScheme {
    fn allows(&self, scheme: PreferScheme) -> bool {
        match scheme {
            PreferScheme::None => true,
            PreferScheme::Dark => self.dark,
            PreferScheme::Light => !self.dark,
        }
    }
}
