use sheetmerge_core::{Table, Value};

use crate::config::MergeConfig;
use crate::error::MergeError;
use crate::model::{MergeRequest, MergeResult, SourceRowCount};
use crate::provenance::resolve_labels;
use crate::schema::reconcile;

/// Combines labelled tables into one provenance-tagged table.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    config: MergeConfig,
}

impl MergeEngine {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn source_column(&self) -> &str {
        &self.config.source_column
    }

    /// Reconcile, tag and stack the request's tables. Inputs are never modified;
    /// any failure leaves nothing behind.
    pub fn merge(&self, request: &MergeRequest) -> Result<MergeResult, MergeError> {
        if request.tables.is_empty() {
            return Err(MergeError::EmptyMerge);
        }
        if request.tables.len() != request.labels.len() {
            return Err(MergeError::ArityMismatch {
                tables: request.tables.len(),
                labels: request.labels.len(),
            });
        }

        let source_column = self.source_column();
        let labels = resolve_labels(&request.labels);

        // Single source: no reconciliation, no normalization
        if let [table] = request.tables.as_slice() {
            let tagged = self.tag(table, 0, &labels[0])?;
            return Ok(MergeResult {
                columns: table.column_names().iter().map(|s| s.to_string()).collect(),
                table: tagged,
                sources: vec![SourceRowCount { label: labels[0].clone(), rows: table.row_count() }],
                mode: request.mode,
                source_column: source_column.to_string(),
            });
        }

        let reconciliation = reconcile(&request.tables, request.mode)?;

        let mut tagged = Vec::with_capacity(request.tables.len());
        let mut sources = Vec::with_capacity(request.tables.len());
        for (idx, ((table, projection), label)) in request
            .tables
            .iter()
            .zip(&reconciliation.projections)
            .zip(&labels)
            .enumerate()
        {
            let projected = projection.apply(table)?;
            sources.push(SourceRowCount { label: label.clone(), rows: projected.row_count() });
            tagged.push(self.tag(&projected, idx, label)?);
        }

        Ok(MergeResult {
            columns: reconciliation.columns,
            table: Table::concat(&tagged)?,
            sources,
            mode: request.mode,
            source_column: source_column.to_string(),
        })
    }

    fn tag(&self, table: &Table, table_index: usize, label: &str) -> Result<Table, MergeError> {
        let column = self.source_column();
        if table.contains_column(column) {
            return Err(MergeError::ProvenanceColumnConflict {
                column: column.to_string(),
                table_index,
            });
        }
        Ok(table.with_constant_column(column, Value::Str(label.to_string()))?)
    }
}
