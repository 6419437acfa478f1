//! Error types for the matching core.
//!
//! Pattern errors are recovered on the match path and only reported.
//! Index and order errors mean the caller misused the API and are returned.

use crate::types::{RuleKind, StyleId};

/// Where a malformed pattern lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternSource {
    /// A target rule of a section
    Rule(RuleKind),
    /// A style-level exclusion glob
    Exclusion,
    /// A style-level inclusion glob
    Inclusion,
}

impl std::fmt::Display for PatternSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rule(kind) => f.write_str(kind.as_str()),
            Self::Exclusion => f.write_str("exclusion"),
            Self::Inclusion => f.write_str("inclusion"),
        }
    }
}

/// A pattern that failed to compile. It is treated as never matching.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid {source_kind} pattern {pattern:?}: {message}")]
pub struct PatternError {
    pub source_kind: PatternSource,
    pub pattern: String,
    pub message: String,
}

/// Invariant violations on the style index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error("Style has no id (not persisted yet)")]
    MissingId,
    #[error("Style {0} is already indexed")]
    DuplicateId(StyleId),
    #[error("Style {0} is not indexed")]
    UnknownId(StyleId),
}

/// Rejected injection-order descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("Style {0} appears more than once in the injection order")]
    DuplicateStyle(StyleId),
}

/// Errors surfaced by the engine's mutation API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Engine configuration could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config value: {0}")]
    Value(String),
}
