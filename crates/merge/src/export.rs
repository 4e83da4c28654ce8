// Export planning: size summaries, pre-flight validation, and hand-off to a writer

use std::collections::HashSet;

use serde::Serialize;

use sheetmerge_core::{Column, Table, TableError, TableWriter};

use crate::error::MergeError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Columns to export, in output order, plus the file-name stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSelection {
    pub columns: Vec<String>,
    pub file_stem: String,
}

impl ExportSelection {
    pub fn new(columns: Vec<String>, file_stem: impl Into<String>) -> Self {
        Self { columns, file_stem: file_stem.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportSummary {
    pub total_rows: usize,
    pub total_columns: usize,
    pub selected_columns: Vec<String>,
    /// Human-readable estimate, e.g. `"1.25 MB"`.
    pub estimated_size: String,
    pub estimated_size_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportValidation {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// An encoded export ready to hand to the caller.
#[derive(Debug, Clone)]
pub struct ExportArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExportSummaryBuilder;

impl ExportSummaryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Summarize the export of `selected` (all columns when empty) without
    /// building the projected table.
    pub fn summarize(
        &self,
        table: &Table,
        selected: &[String],
    ) -> Result<ExportSummary, MergeError> {
        let columns = selected_columns(table, selected)?;
        let bytes: usize = columns.iter().map(|c| c.estimated_size()).sum();
        Ok(ExportSummary {
            total_rows: table.row_count(),
            total_columns: columns.len(),
            selected_columns: columns.iter().map(|c| c.name().to_string()).collect(),
            estimated_size: format_megabytes(bytes),
            estimated_size_bytes: bytes,
        })
    }
}

/// Pre-flight checks: unknown columns are errors, an empty table or an
/// estimate above `large_threshold` bytes are warnings.
pub fn validate_export(
    table: &Table,
    selected: &[String],
    large_threshold: usize,
) -> ExportValidation {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    match ExportSummaryBuilder.summarize(table, selected) {
        Ok(summary) => {
            if table.is_empty() {
                warnings.push(
                    "table has no rows; the export will only contain headers".to_string(),
                );
            }
            if summary.estimated_size_bytes > large_threshold {
                warnings.push(format!(
                    "large export ({}); writing may be slow",
                    summary.estimated_size
                ));
            }
        }
        Err(e) => errors.push(e.to_string()),
    }

    ExportValidation { valid: errors.is_empty(), warnings, errors }
}

/// Validate the selection, project it and encode it with `writer`.
/// Nothing is encoded unless every selected column exists.
pub fn export_selection(
    table: &Table,
    selection: &ExportSelection,
    writer: &dyn TableWriter,
) -> Result<ExportArtifact, MergeError> {
    let projected = if selection.columns.is_empty() {
        table.clone()
    } else {
        check_columns(table, &selection.columns)?;
        table.select(&selection.columns)?
    };
    let bytes = writer.write(&projected)?;
    Ok(ExportArtifact {
        file_name: format!("{}.{}", selection.file_stem, writer.extension()),
        mime_type: writer.mime_type(),
        bytes,
    })
}

/// Every selected name must exist and appear once.
fn check_columns(table: &Table, selected: &[String]) -> Result<(), MergeError> {
    let missing = table.missing_columns(selected);
    if !missing.is_empty() {
        return Err(MergeError::UnknownColumn { columns: missing });
    }
    let mut seen = HashSet::with_capacity(selected.len());
    if let Some(dup) = selected.iter().find(|name| !seen.insert(name.as_str())) {
        return Err(TableError::DuplicateColumn(dup.clone()).into());
    }
    Ok(())
}

fn selected_columns<'a>(
    table: &'a Table,
    selected: &[String],
) -> Result<Vec<&'a Column>, MergeError> {
    if selected.is_empty() {
        return Ok(table.columns().iter().collect());
    }
    check_columns(table, selected)?;
    Ok(selected.iter().filter_map(|name| table.column(name)).collect())
}

fn format_megabytes(bytes: usize) -> String {
    format!("{:.2} MB", bytes as f64 / BYTES_PER_MB)
}
