//! SQL text normalization and read/write classification.
//!
//! The fallback drivers accept one statement at a time. Incoming text is
//! flattened to a single line first so multi-line statements and noisy
//! indentation behave the same on every path, then classified by its
//! leading keyword to pick the driver's query or execute entry point.

use regex::Regex;
use std::sync::OnceLock;

/// Statement classification for the fallback execute path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Produces a result set; goes through the driver's fetch path.
    Read,
    /// Everything else; executed and answered with a synthesized row.
    Write,
}

/// Leading keywords of statements that produce a result set.
const READ_PREFIXES: [&str; 7] = ["SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "TABLE", "WITH"];

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("constant pattern"))
}

/// Collapse line breaks and whitespace runs to single spaces and trim.
///
/// Whitespace-only input normalizes to the empty string.
pub fn normalize_sql(sql: &str) -> String {
    whitespace().replace_all(sql, " ").trim().to_string()
}

/// Classify a statement by its leading keyword, case-insensitively.
///
/// The empty statement classifies as a write so it reaches the driver's
/// execute path and surfaces the server's own syntax error.
pub fn classify(sql: &str) -> StatementKind {
    let upper = sql.trim_start().to_uppercase();
    if READ_PREFIXES.iter().any(|prefix| upper.starts_with(prefix)) {
        StatementKind::Read
    } else {
        StatementKind::Write
    }
}
