//! Pattern matching for single target rules and style-level globs.
//!
//! `matches` is the pure, stateless form. The index precompiles regexps
//! and globs once per style through `CompiledRegexp` and `Glob` so the
//! hot path never compiles anything.

use regex::{Regex, RegexBuilder};

use crate::error::{PatternError, PatternSource};
use crate::types::RuleKind;
use crate::url::{extract_host, host_matches_domain, strip_fragment, strip_query_and_fragment};

/// Compiled-program budget per pattern. Larger patterns are rejected as
/// malformed rather than allowed to balloon memory.
const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Does a single target rule match `url`?
///
/// Malformed regexps never match. Use `CompiledRegexp::compile` to find out
/// why a regexp is malformed.
pub fn matches(kind: RuleKind, value: &str, url: &str) -> bool {
    match kind {
        RuleKind::Url => url_rule_matches(value, url),
        RuleKind::UrlPrefix => prefix_rule_matches(value, url),
        RuleKind::Domain => extract_host(url).is_some_and(|host| host_matches_domain(host, value)),
        RuleKind::Regexp => compile_regex(value).is_ok_and(|re| re.is_match(url)),
    }
}

/// Exact URL, also tried without the fragment.
#[inline]
pub fn url_rule_matches(value: &str, url: &str) -> bool {
    value == url || value == strip_fragment(url)
}

#[inline]
pub fn prefix_rule_matches(value: &str, url: &str) -> bool {
    !value.is_empty() && url.starts_with(value)
}

fn compile_regex(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).size_limit(REGEX_SIZE_LIMIT).build()
}

// =============================================================================
// Regexp Rules
// =============================================================================

/// A regexp rule compiled once at ingestion.
#[derive(Debug, Clone)]
pub struct CompiledRegexp {
    regex: Regex,
    mentions_extension: bool,
}

impl CompiledRegexp {
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let regex = compile_regex(pattern).map_err(|e| PatternError {
            source_kind: PatternSource::Rule(RuleKind::Regexp),
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            regex,
            mentions_extension: contains_word(pattern, "extension"),
        })
    }

    #[inline]
    pub fn is_match(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// Regexps may target the extension's own pages only if they say so.
    #[inline]
    pub fn mentions_extension(&self) -> bool {
        self.mentions_extension
    }
}

fn contains_word(haystack: &str, word: &str) -> bool {
    let is_word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    haystack.match_indices(word).any(|(pos, _)| {
        let before = haystack[..pos].chars().next_back();
        let after = haystack[pos + word.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

// =============================================================================
// Globs
// =============================================================================

/// A style-level inclusion/exclusion pattern.
///
/// `*` is a wildcard and `\*` a literal star. A glob shaped like
/// `scheme://[*.]host/path` is treated as a match pattern: a `*` scheme
/// accepts any scheme and `*.` accepts any subdomain (or none).
/// The whole URL, minus query and fragment, must match.
#[derive(Debug, Clone)]
pub struct Glob {
    regex: Regex,
}

impl Glob {
    pub fn compile(text: &str, source_kind: PatternSource) -> Result<Self, PatternError> {
        let source = glob_to_regex(text);
        let regex = compile_regex(&source).map_err(|e| PatternError {
            source_kind,
            pattern: text.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { regex })
    }

    #[inline]
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(strip_query_and_fragment(url))
    }
}

fn glob_to_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    out.push('^');
    match split_match_pattern(text) {
        Some((scheme, any_subdomain, rest)) => {
            if scheme == "*" {
                out.push_str(r"[\w-]+");
            } else {
                out.push_str(&regex::escape(scheme));
            }
            out.push_str("://");
            if any_subdomain {
                out.push_str(r"(?:[\w.-]+\.)?");
            }
            push_glob(&mut out, rest);
        }
        None => push_glob(&mut out, text),
    }
    out.push('$');
    out
}

/// `scheme://[*.]host/rest` -> (scheme, has `*.`, `host/rest`)
fn split_match_pattern(text: &str) -> Option<(&str, bool, &str)> {
    let (scheme, rest) = text.split_once("://")?;
    let scheme_ok = scheme == "*"
        || (!scheme.is_empty() && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    if !scheme_ok {
        return None;
    }
    let (any_subdomain, rest) = match rest.strip_prefix("*.") {
        Some(stripped) => (true, stripped),
        None => (false, rest),
    };
    let slash = rest.find('/')?;
    let host = &rest[..slash];
    if host.is_empty() || !host.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return None;
    }
    Some((scheme, any_subdomain, rest))
}

fn push_glob(out: &mut String, glob: &str) {
    let mut chars = glob.chars().peekable();
    let mut buf = [0u8; 4];
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(r"\*");
            }
            '*' => out.push_str(".*"),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_rule() {
        assert!(matches(RuleKind::Url, "https://a.com/x", "https://a.com/x"));
        assert!(matches(RuleKind::Url, "https://a.com/x", "https://a.com/x#frag"));
        assert!(!matches(RuleKind::Url, "https://a.com/x", "https://a.com/x/"));
        assert!(!matches(RuleKind::Url, "https://a.com/x#frag", "https://a.com/x"));
    }

    #[test]
    fn test_prefix_rule() {
        assert!(matches(RuleKind::UrlPrefix, "https://a.com/", "https://a.com/page"));
        assert!(!matches(RuleKind::UrlPrefix, "https://a.com/", "http://a.com/page"));
        assert!(!matches(RuleKind::UrlPrefix, "", "https://a.com/page"));
    }

    #[test]
    fn test_domain_rule() {
        assert!(matches(RuleKind::Domain, "example.com", "https://sub.example.com/x"));
        assert!(matches(RuleKind::Domain, "example.com", "https://example.com"));
        assert!(matches(RuleKind::Domain, "example.com", "http://example.com:8080/"));
        assert!(!matches(RuleKind::Domain, "example.com", "https://notexample.com/x"));
        assert!(!matches(RuleKind::Domain, "example.com", "https://example.com.evil.net/"));
        assert!(!matches(RuleKind::Domain, "example.com", "example.com"));
    }

    #[test]
    fn test_regexp_rule_searches_anywhere() {
        assert!(matches(RuleKind::Regexp, r"example\.(com|org)", "https://www.example.org/a"));
        assert!(matches(RuleKind::Regexp, r"^https://", "https://a.com"));
        assert!(!matches(RuleKind::Regexp, r"^http://", "https://a.com"));
    }

    #[test]
    fn test_invalid_regexp_never_matches() {
        assert!(!matches(RuleKind::Regexp, "(", "("));
        let err = CompiledRegexp::compile("(").expect_err("should fail");
        assert_eq!(err.pattern, "(");
        assert_eq!(err.source_kind, PatternSource::Rule(RuleKind::Regexp));
    }

    #[test]
    fn test_mentions_extension() {
        assert!(CompiledRegexp::compile(r"chrome-extension://.*").unwrap().mentions_extension());
        assert!(!CompiledRegexp::compile(r"extensions\.com").unwrap().mentions_extension());
    }

    #[test]
    fn test_plain_glob() {
        let glob = Glob::compile("*.example.com/*", PatternSource::Exclusion).unwrap();
        assert!(glob.matches("https://www.example.com/a"));
        assert!(!glob.matches("https://example.com/a"));
        let glob = Glob::compile("*://*.example.com/*", PatternSource::Exclusion).unwrap();
        assert!(glob.matches("https://www.example.com/a"));
        assert!(glob.matches("http://example.com/"));
        assert!(!glob.matches("https://example.org/"));
    }

    #[test]
    fn test_glob_ignores_query_and_fragment() {
        let glob = Glob::compile("https://a.com/page", PatternSource::Inclusion).unwrap();
        assert!(glob.matches("https://a.com/page?x=1#top"));
        assert!(!glob.matches("https://a.com/page2"));
    }

    #[test]
    fn test_glob_escapes_literals() {
        let glob = Glob::compile(r"https://a.com/\*", PatternSource::Exclusion).unwrap();
        assert!(glob.matches("https://a.com/*"));
        assert!(!glob.matches("https://a.com/x"));
        let glob = Glob::compile("https://a.com/(x)+", PatternSource::Exclusion).unwrap();
        assert!(glob.matches("https://a.com/(x)+"));
    }
}
