//! StyleMatch Backup Importer
//!
//! This crate turns a style backup (a JSON array of style objects) into
//! validated `Style`s, collapses duplicates, and classifies each one
//! against the styles already loaded in a `MatchEngine`.

pub mod optimizer;
pub mod parser;
pub mod report;

use sm_core::engine::MatchEngine;
use sm_core::error::EngineError;
use sm_core::types::Style;

pub use optimizer::{dedupe_styles, DedupeStats};
pub use parser::{parse_backup, InvalidEntry, ParsedBackup};
pub use report::{classify, ImportKind, ImportReport};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid backup JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Backup must be a JSON array of styles")]
    NotAnArray,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result of importing a backup into an engine.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub report: ImportReport,
    pub invalid: Vec<InvalidEntry>,
    pub skipped: usize,
    pub dedupe: DedupeStats,
    /// Whether the backup's injection order replaced the engine's
    pub order_applied: bool,
}

/// Parse, dedupe, classify and apply a backup in one go.
pub fn import_into(engine: &mut MatchEngine, text: &str) -> Result<ImportOutcome, ImportError> {
    let ParsedBackup {
        mut styles,
        invalid,
        skipped,
        order,
    } = parse_backup(text)?;
    let dedupe = dedupe_styles(&mut styles);

    let existing: Vec<Style> = engine.styles().cloned().collect();
    let report = classify(&existing, styles);
    report.apply(engine)?;

    // The backup's order names styles by their backup ids
    let order_applied = match order {
        Some(order) => {
            engine
                .set_injection_order(report.remap_order(&order))
                .map_err(EngineError::from)?;
            true
        }
        None => false,
    };

    Ok(ImportOutcome {
        report,
        invalid,
        skipped,
        dedupe,
        order_applied,
    })
}
