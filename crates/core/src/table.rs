// Immutable column-oriented tables

use std::collections::HashSet;

use thiserror::Error;

use crate::column::{Column, ColumnKind};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch { column: String, expected: usize, found: usize },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("unknown column(s): {}", .0.join(", "))]
    UnknownColumns(Vec<String>),
    #[error(
        "cannot stack tables with different columns: [{}] vs [{}]",
        .expected.join(", "),
        .found.join(", ")
    )]
    SchemaMismatch { expected: Vec<String>, found: Vec<String> },
    #[error("column '{column}' is {expected} but holds a {found} value")]
    KindMismatch { column: String, expected: ColumnKind, found: ColumnKind },
    #[error("column '{column}' cannot be converted from {from} to {to}")]
    InvalidCast { column: String, from: ColumnKind, to: ColumnKind },
}

/// Ordered set of equally long, uniquely named columns.
///
/// Tables are values: every operation returns a new table and leaves the
/// receiver untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let row_count = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::new();
        for column in &columns {
            if column.len() != row_count {
                return Err(TableError::LengthMismatch {
                    column: column.name().to_string(),
                    expected: row_count,
                    found: column.len(),
                });
            }
            if !seen.insert(column.name()) {
                return Err(TableError::DuplicateColumn(column.name().to_string()));
            }
        }
        Ok(Self { columns, row_count })
    }

    /// Build a table from named value vectors, inferring each column's kind.
    pub fn from_values<N: Into<String>>(columns: Vec<(N, Vec<Value>)>) -> Result<Self, TableError> {
        Self::new(columns.into_iter().map(|(name, values)| Column::infer(name, values)).collect())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Values of one row, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().filter_map(|c| c.get(index)).collect())
    }

    /// Names from `names` that this table does not have, in request order.
    pub fn missing_columns<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n: &&str| !self.contains_column(n))
            .map(str::to_string)
            .collect()
    }

    /// Subset of columns in the requested order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table, TableError> {
        let missing = self.missing_columns(names);
        if !missing.is_empty() {
            return Err(TableError::UnknownColumns(missing));
        }
        let columns = names
            .iter()
            .filter_map(|n| self.column(n.as_ref()).cloned())
            .collect();
        Table::new(columns)
    }

    /// Subset and rename in one pass: each pair is `(existing, new_name)`.
    pub fn project<S: AsRef<str>, T: AsRef<str>>(
        &self,
        mapping: &[(S, T)],
    ) -> Result<Table, TableError> {
        let sources: Vec<&str> = mapping.iter().map(|(s, _)| s.as_ref()).collect();
        let missing = self.missing_columns(&sources);
        if !missing.is_empty() {
            return Err(TableError::UnknownColumns(missing));
        }
        let columns = mapping
            .iter()
            .filter_map(|(src, dst)| self.column(src.as_ref()).map(|c| c.renamed(dst.as_ref())))
            .collect();
        Table::new(columns)
    }

    /// Append a column at the end.
    pub fn with_column(&self, column: Column) -> Result<Table, TableError> {
        let mut columns = self.columns.clone();
        columns.push(column);
        Table::new(columns)
    }

    /// Append a column holding the same value on every row.
    pub fn with_constant_column(&self, name: &str, value: Value) -> Result<Table, TableError> {
        self.with_column(Column::constant(name, value, self.row_count))
    }

    /// Replace the column with the same name, keeping its position.
    pub fn replace_column(&self, column: Column) -> Result<Table, TableError> {
        let position = self
            .columns
            .iter()
            .position(|c| c.name() == column.name())
            .ok_or_else(|| TableError::UnknownColumns(vec![column.name().to_string()]))?;
        let mut columns = self.columns.clone();
        columns[position] = column;
        Table::new(columns)
    }

    /// Rows at `indices`, in that order. Out-of-range indices are skipped.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let indices: Vec<usize> = indices.iter().copied().filter(|&i| i < self.row_count).collect();
        let columns: Vec<Column> = self.columns.iter().map(|c| c.take(&indices)).collect();
        Table { columns, row_count: indices.len() }
    }

    pub fn head(&self, n: usize) -> Table {
        let indices: Vec<usize> = (0..self.row_count.min(n)).collect();
        self.take_rows(&indices)
    }

    /// Stack tables vertically, in order. All tables must have the same column
    /// names in the same order; per-column kinds are unified.
    pub fn concat(tables: &[Table]) -> Result<Table, TableError> {
        let Some(first) = tables.first() else {
            return Ok(Table::default());
        };
        let expected: Vec<&str> = first.column_names();
        for table in &tables[1..] {
            let found = table.column_names();
            if found != expected {
                return Err(TableError::SchemaMismatch {
                    expected: expected.iter().map(|s| s.to_string()).collect(),
                    found: found.iter().map(|s| s.to_string()).collect(),
                });
            }
        }

        let mut columns = Vec::with_capacity(expected.len());
        for (idx, _) in expected.iter().enumerate() {
            let kind = tables
                .iter()
                .map(|t| t.columns[idx].kind())
                .fold(ColumnKind::Null, ColumnKind::unify);
            let mut merged = first.columns[idx].cast(kind)?;
            for table in &tables[1..] {
                merged.append(&table.columns[idx].cast(kind)?);
            }
            columns.push(merged);
        }
        let row_count = tables.iter().map(Table::row_count).sum();
        Ok(Table { columns, row_count })
    }

    /// Sum of per-column estimates; see [`Column::estimated_size`].
    pub fn estimated_size(&self) -> usize {
        self.columns.iter().map(Column::estimated_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Table {
        Table::from_values(vec![
            ("id", vec![Value::Int(1), Value::Int(2)]),
            ("name", vec![Value::from("Ann"), Value::from("Bo")]),
        ])
        .unwrap()
    }

    #[test]
    fn new_rejects_ragged_and_duplicate_columns() {
        let ragged = Table::new(vec![
            Column::infer("a", vec![Value::Int(1)]),
            Column::infer("b", vec![Value::Int(1), Value::Int(2)]),
        ]);
        assert!(matches!(ragged, Err(TableError::LengthMismatch { .. })));

        let dup = Table::new(vec![
            Column::infer("a", vec![Value::Int(1)]),
            Column::infer("a", vec![Value::Int(2)]),
        ]);
        assert_eq!(dup, Err(TableError::DuplicateColumn("a".into())));
    }

    #[test]
    fn select_keeps_requested_order() {
        let t = people().select(&["name", "id"]).unwrap();
        assert_eq!(t.column_names(), vec!["name", "id"]);
        assert_eq!(t.row_count(), 2);
    }

    #[test]
    fn select_reports_every_unknown_name() {
        let err = people().select(&["id", "x", "y"]).unwrap_err();
        assert_eq!(err, TableError::UnknownColumns(vec!["x".into(), "y".into()]));
    }

    #[test]
    fn project_renames() {
        let t = people().project(&[("name", "full_name")]).unwrap();
        assert_eq!(t.column_names(), vec!["full_name"]);
    }

    #[test]
    fn concat_unifies_kinds() {
        let a = Table::from_values(vec![("x", vec![Value::Int(1)])]).unwrap();
        let b = Table::from_values(vec![("x", vec![Value::Float(0.5)])]).unwrap();
        let c = Table::from_values(vec![("x", vec![Value::Null])]).unwrap();
        let t = Table::concat(&[a, b, c]).unwrap();
        let col = t.column("x").unwrap();
        assert_eq!(col.kind(), ColumnKind::Float);
        assert_eq!(col.values(), &[Value::Float(1.0), Value::Float(0.5), Value::Null]);
    }

    #[test]
    fn concat_rejects_reordered_columns() {
        let a = people();
        let b = people().select(&["name", "id"]).unwrap();
        assert!(matches!(Table::concat(&[a, b]), Err(TableError::SchemaMismatch { .. })));
    }

    #[test]
    fn take_rows_and_head() {
        let t = people();
        assert_eq!(t.take_rows(&[1, 0, 9]).row_count(), 2);
        assert_eq!(t.head(1).row(0).unwrap()[1], &Value::from("Ann"));
        assert_eq!(t.head(10).row_count(), 2);
    }

    #[test]
    fn constant_column_on_empty_table() {
        let empty = Table::from_values(vec![("a", Vec::<Value>::new())]).unwrap();
        let tagged = empty.with_constant_column("source", Value::from("f")).unwrap();
        assert_eq!(tagged.row_count(), 0);
        assert_eq!(tagged.column_count(), 2);
    }

    #[test]
    fn estimate_grows_with_rows_and_columns() {
        let small = people();
        let wider = small.with_constant_column("flag", Value::Bool(true)).unwrap();
        let taller = Table::concat(&[small.clone(), small.clone()]).unwrap();
        assert!(wider.estimated_size() >= small.estimated_size());
        assert!(taller.estimated_size() >= small.estimated_size());
    }
}
