//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `smerge` exit codes.
//! Scripts rely on them, so a code never changes meaning once shipped.
//!
//! # Exit Codes
//!
//! | Code | Domain    | Description                                        |
//! |------|-----------|----------------------------------------------------|
//! | 0    | Universal | Success                                            |
//! | 1    | Universal | General error (unspecified)                        |
//! | 2    | Universal | CLI usage error (bad args, unreadable input path)  |
//! | 3    | read      | A file could not be read, or nothing was readable  |
//! | 4    | merge     | Strict schemas differ / provenance column clashes  |
//! | 5    | merge     | Intersection found no shared columns               |
//! | 6    | export    | Selected column does not exist                     |
//! | 7    | export    | `--require` columns missing from the merged table  |
//! | 8    | export    | Writer failed (too large, encode error, disk)      |
//! | 9    | config    | Settings file unreadable or invalid                |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant with the next free number
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the mapping functions below

use serde::Serialize;
use sheetmerge_merge::MergeError;

use crate::session::SessionError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing input files.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Read (3)
// =============================================================================

/// Unsupported, undecodable, oversized or cancelled file
/// (with `--fail-on-read-error`), or no file produced a table.
pub const EXIT_READ: u8 = 3;

// =============================================================================
// Merge (4-5)
// =============================================================================

/// Strict mode found differing column sequences.
pub const EXIT_SCHEMA_MISMATCH: u8 = 4;

/// Intersection mode found no column shared by every table.
pub const EXIT_NO_COMMON_COLUMNS: u8 = 5;

// =============================================================================
// Export (6-8)
// =============================================================================

/// `--select` named a column the merged table does not have.
pub const EXIT_UNKNOWN_COLUMN: u8 = 6;

/// `--require` columns are missing.
pub const EXIT_REQUIRED_MISSING: u8 = 7;

/// Output could not be encoded or written.
pub const EXIT_WRITE: u8 = 8;

// =============================================================================
// Config (9)
// =============================================================================

/// Settings file could not be read or parsed.
pub const EXIT_CONFIG: u8 = 9;

// =============================================================================
// Error mapping
// =============================================================================

pub fn merge_exit_code(err: &MergeError) -> u8 {
    match err {
        MergeError::SchemaMismatch { .. } | MergeError::ProvenanceColumnConflict { .. } => {
            EXIT_SCHEMA_MISMATCH
        }
        MergeError::NoCommonColumns { .. } => EXIT_NO_COMMON_COLUMNS,
        MergeError::UnknownColumn { .. } => EXIT_UNKNOWN_COLUMN,
        MergeError::Write(_) => EXIT_WRITE,
        MergeError::ConfigParse(_) => EXIT_CONFIG,
        MergeError::EmptyMerge | MergeError::ArityMismatch { .. } | MergeError::Table(_) => {
            EXIT_ERROR
        }
    }
}

pub fn session_exit_code(err: &SessionError) -> u8 {
    match err {
        SessionError::Read(_) | SessionError::NoSources { .. } => EXIT_READ,
        SessionError::Merge(e) => merge_exit_code(e),
        SessionError::NotMerged => EXIT_ERROR,
    }
}

/// Machine-readable error, printed to stderr when `--json` is set.
#[derive(Debug, Serialize)]
pub struct ErrorOutput {
    pub error: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl ErrorOutput {
    pub fn from_session_error(err: &SessionError) -> Self {
        let error = match err {
            SessionError::Read(_) => "read_failed",
            SessionError::NoSources { .. } => "no_sources",
            SessionError::NotMerged => "not_merged",
            SessionError::Merge(e) => match e {
                MergeError::SchemaMismatch { .. } => "schema_mismatch",
                MergeError::ProvenanceColumnConflict { .. } => "provenance_column_conflict",
                MergeError::NoCommonColumns { .. } => "no_common_columns",
                MergeError::UnknownColumn { .. } => "unknown_column",
                MergeError::Write(_) => "write_failed",
                MergeError::ConfigParse(_) => "invalid_config",
                MergeError::EmptyMerge => "empty_merge",
                MergeError::ArityMismatch { .. } => "arity_mismatch",
                MergeError::Table(_) => "table_error",
            },
        };
        Self { error, message: err.to_string(), exit_code: session_exit_code(err) }
    }

    pub fn print(&self) {
        if let Ok(output) = serde_json::to_string(self) {
            eprintln!("{}", output);
        }
    }
}
