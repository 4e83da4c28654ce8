use thiserror::Error;

use sheetmerge_core::{TableError, WriteError};

use crate::schema::SchemaDiff;

#[derive(Debug, Error)]
pub enum MergeError {
    /// Merge requested with no tables.
    #[error("nothing to merge: no tables were provided")]
    EmptyMerge,
    /// Table and label counts differ.
    #[error("{tables} table(s) but {labels} provenance label(s)")]
    ArityMismatch { tables: usize, labels: usize },
    /// Strict mode found tables whose columns differ from the first table.
    #[error("column names differ between files: {}", describe_diffs(.mismatches))]
    SchemaMismatch { mismatches: Vec<SchemaDiff> },
    /// Intersection mode found no shared column.
    #[error("no column is shared by all {tables} tables")]
    NoCommonColumns { tables: usize },
    /// The provenance column name is already a data column.
    #[error("table {table_index} already has a column named '{column}'")]
    ProvenanceColumnConflict { column: String, table_index: usize },
    /// Selection names columns that are not in the table.
    #[error("unknown column(s): {}", .columns.join(", "))]
    UnknownColumn { columns: Vec<String> },
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("config parse error: {0}")]
    ConfigParse(String),
}

fn describe_diffs(diffs: &[SchemaDiff]) -> String {
    diffs.iter().map(SchemaDiff::to_string).collect::<Vec<_>>().join("; ")
}
