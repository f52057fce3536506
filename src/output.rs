//! CLI output formatting.
//!
//! Output is document-centric: each line leads with the document's position
//! and title, and what was written for it follows as indented context lines.
//!
//! ## Build
//!
//! ```text
//! 001 Hello → 2024-03-01-Hello.html
//!     Asset: abc-a.png
//!     Skipped: notes.pdf
//! 002 Draft (unpublished)
//! 003 Broken
//!     Failed: Rewrite error: markup has no <body> element
//!
//! Index
//!     row 4 (b): column 'Date': '3/1/2024' is not a serial date
//!
//! Wrote 1 post, 1 unpublished, 1 failed; 3 index rows
//! ```
//!
//! ## Check
//!
//! ```text
//! Index: 12 records
//!     row 4 (b): column 'Date': '3/1/2024' is not a serial date
//! ```
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure.

use crate::index::{IndexSnapshot, RowError};
use crate::pipeline::{DocumentOutcome, DocumentStatus, RunSummary};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Title for display; untitled documents show their id in parens.
fn display_title(outcome: &DocumentOutcome) -> String {
    if outcome.title.trim().is_empty() {
        format!("({})", outcome.id)
    } else {
        outcome.title.clone()
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Build
// ============================================================================

/// Lines for one finished document, `pos` being its 1-based position.
pub fn format_document_outcome(pos: usize, outcome: &DocumentOutcome) -> Vec<String> {
    let head = format!("{} {}", format_index(pos), display_title(outcome));
    match &outcome.status {
        DocumentStatus::Written {
            post,
            assets,
            skipped,
        } => {
            let mut lines = vec![format!("{head} → {post}")];
            lines.extend(assets.iter().map(|a| format!("{}Asset: {a}", indent(1))));
            lines.extend(skipped.iter().map(|s| format!("{}Skipped: {s}", indent(1))));
            lines
        }
        DocumentStatus::Unpublished => vec![format!("{head} (unpublished)")],
        DocumentStatus::Failed(reason) => {
            vec![head, format!("{}Failed: {reason}", indent(1))]
        }
    }
}

pub fn format_index_errors(errors: &[RowError]) -> Vec<String> {
    errors
        .iter()
        .map(|e| format!("{}{e}", indent(1)))
        .collect()
}

/// Row errors (if any) and the closing totals line of a build.
pub fn format_run_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = Vec::new();
    if !summary.index_errors.is_empty() {
        lines.push(String::new());
        lines.push("Index".to_string());
        lines.extend(format_index_errors(&summary.index_errors));
    }
    lines.push(String::new());
    lines.push(format!(
        "Wrote {}, {} unpublished, {} failed; {}",
        plural(summary.written(), "post"),
        summary.unpublished(),
        summary.failed(),
        plural(summary.records_written, "index row"),
    ));
    lines
}

pub fn print_document_outcome(pos: usize, outcome: &DocumentOutcome) {
    for line in format_document_outcome(pos, outcome) {
        println!("{}", line);
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    for line in format_run_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Result of reading the index without building. `None` means no index
/// exists yet.
pub fn format_index_check(snapshot: Option<&IndexSnapshot>) -> Vec<String> {
    let Some(snapshot) = snapshot else {
        return vec!["Index: not created yet (the first build creates it)".to_string()];
    };
    let mut lines = vec![format!("Index: {}", plural(snapshot.records.len(), "record"))];
    if !snapshot.header_ok {
        lines.push(format!(
            "{}Header does not match the expected columns",
            indent(1)
        ));
    }
    lines.extend(format_index_errors(&snapshot.errors));
    lines
}

pub fn print_index_check(snapshot: Option<&IndexSnapshot>) {
    for line in format_index_check(snapshot) {
        println!("{}", line);
    }
}
