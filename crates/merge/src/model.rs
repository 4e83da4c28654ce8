use std::collections::HashMap;

use serde::Serialize;

use sheetmerge_core::Table;

use crate::config::MergeMode;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Tables to merge, each paired with the label of the source it came from.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub tables: Vec<Table>,
    pub labels: Vec<String>,
    pub mode: MergeMode,
}

impl MergeRequest {
    pub fn new(tables: Vec<Table>, labels: Vec<String>, mode: MergeMode) -> Self {
        Self { tables, labels, mode }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRowCount {
    pub label: String,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Reconciled data columns, without the provenance column.
    pub columns: Vec<String>,
    /// Merged rows: reconciled columns then the provenance column.
    pub table: Table,
    /// Rows contributed by each source, in source order.
    pub sources: Vec<SourceRowCount>,
    pub mode: MergeMode,
    pub source_column: String,
}

impl MergeResult {
    pub fn total_rows(&self) -> usize {
        self.table.row_count()
    }

    pub fn rows_for(&self, label: &str) -> Option<usize> {
        self.sources.iter().find(|s| s.label == label).map(|s| s.rows)
    }

    /// Swap in a row-filtered version of the merged table and recount each
    /// source from the provenance column. Sources left with no rows stay
    /// listed with a count of 0.
    pub fn replace_table(&mut self, table: Table) {
        let mut counts: HashMap<&str, usize> = HashMap::with_capacity(self.sources.len());
        if let Some(labels) = table.column(&self.source_column) {
            for label in labels.values().iter().filter_map(|v| v.as_str()) {
                *counts.entry(label).or_default() += 1;
            }
        }
        for source in &mut self.sources {
            source.rows = counts.get(source.label.as_str()).copied().unwrap_or(0);
        }
        self.table = table;
    }

    pub fn summary(&self) -> MergeSummary {
        MergeSummary {
            mode: self.mode,
            source_column: self.source_column.clone(),
            columns: self.columns.clone(),
            total_rows: self.table.row_count(),
            total_columns: self.table.column_count(),
            sources: self.sources.clone(),
        }
    }
}

/// Serializable view of a merge, without the row data.
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub mode: MergeMode,
    pub source_column: String,
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub total_columns: usize,
    pub sources: Vec<SourceRowCount>,
}
