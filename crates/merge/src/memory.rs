// Memory footprint helpers

use sheetmerge_core::{Column, ColumnKind, Table, TableError};

/// String columns with fewer distinct values than this share of their rows
/// become categorical.
pub const CATEGORICAL_RATIO: f64 = 0.5;

/// Default headroom multiplier for processing a table (copies made while merging).
pub const PROCESSING_FACTOR: f64 = 2.0;

/// Convert low-cardinality string columns to categorical. Values are unchanged.
pub fn compact(table: &Table) -> Result<Table, TableError> {
    let columns = table
        .columns()
        .iter()
        .map(|c| {
            if should_categorize(c) {
                c.with_text_kind(ColumnKind::Categorical)
            } else {
                Ok(c.clone())
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Table::new(columns)
}

fn should_categorize(column: &Column) -> bool {
    if column.kind() != ColumnKind::String || column.is_empty() {
        return false;
    }
    (column.unique_count() as f64) / (column.len() as f64) < CATEGORICAL_RATIO
}

/// Bytes needed to process `table`: its estimate times `factor`.
pub fn processing_estimate(table: &Table, factor: f64) -> usize {
    (table.estimated_size() as f64 * factor.max(0.0)).ceil() as usize
}
