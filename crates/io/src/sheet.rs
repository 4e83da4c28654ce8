// Header cleanup and column assembly shared by the decoders

use std::collections::HashSet;

use sheetmerge_core::{Column, Table, Value};

/// Make header names usable as column names: blanks become `column_{n}`
/// (1-based position) and repeats get a `_duplicated_{k}` suffix.
pub(crate) fn unique_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut names = Vec::with_capacity(raw.len());
    for (idx, header) in raw.iter().enumerate() {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() { format!("column_{}", idx + 1) } else { header.clone() };
        let mut name = base.clone();
        let mut k = 0;
        while seen.contains(&name) {
            name = format!("{base}_duplicated_{k}");
            k += 1;
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

/// Transpose decoded rows into columns. Short rows are padded with nulls.
pub(crate) fn columns_from_rows(width: usize, rows: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    let mut columns: Vec<Vec<Value>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
    for row in rows {
        let mut cells = row.into_iter();
        for column in columns.iter_mut() {
            column.push(cells.next().unwrap_or(Value::Null));
        }
    }
    columns
}

/// Assemble decoded columns into a table, flattening model errors to text.
pub(crate) fn build_table(columns: Vec<Column>) -> Result<Table, String> {
    Table::new(columns).map_err(|e| e.to_string())
}
