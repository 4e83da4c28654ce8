// Row-level clean-up applied to a merged table

use std::borrow::Borrow;
use std::collections::HashSet;

use serde::Serialize;

use sheetmerge_core::{Column, Table, TableError, Value, ValueKey};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanStats {
    pub empty_rows_removed: usize,
    pub cells_trimmed: usize,
}

/// Drop exact duplicate rows, keeping the first occurrence of each.
pub fn deduplicate(table: &Table) -> Table {
    let mut seen: HashSet<Vec<ValueKey<'_>>> = HashSet::with_capacity(table.row_count());
    let keep: Vec<usize> = (0..table.row_count())
        .filter(|&row| {
            let key: Vec<ValueKey<'_>> = table
                .columns()
                .iter()
                .filter_map(|c| c.get(row).map(Value::key))
                .collect();
            seen.insert(key)
        })
        .collect();
    table.take_rows(&keep)
}

/// Drop rows where every value is null and trim surrounding whitespace in
/// text cells. Columns named in `exclude` (the provenance column) are left
/// untouched and do not make a row count as non-empty.
pub fn clean(table: &Table, exclude: &[&str]) -> Result<(Table, CleanStats), TableError> {
    let data: Vec<&Column> = table
        .columns()
        .iter()
        .filter(|c| !is_excluded(exclude, c))
        .collect();
    let keep: Vec<usize> = (0..table.row_count())
        .filter(|&row| data.iter().any(|c| c.get(row).is_some_and(|v| !v.is_null())))
        .collect();
    let mut stats = CleanStats {
        empty_rows_removed: table.row_count() - keep.len(),
        cells_trimmed: 0,
    };

    let mut cleaned = table.take_rows(&keep);
    let textual: Vec<String> = cleaned
        .columns()
        .iter()
        .filter(|c| c.kind().is_textual() && !is_excluded(exclude, c))
        .map(|c| c.name().to_string())
        .collect();
    for name in textual {
        let Some(column) = cleaned.column(&name) else {
            continue;
        };
        stats.cells_trimmed += column
            .values()
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| s.trim() != *s)
            .count();
        let trimmed = column.map_values(|v| match v {
            Value::Str(s) => Value::Str(s.trim().to_string()),
            other => other.clone(),
        })?;
        cleaned = cleaned.replace_column(trimmed)?;
    }
    Ok((cleaned, stats))
}

fn is_excluded(exclude: &[&str], column: &Column) -> bool {
    exclude.iter().any(|name| *name == column.name())
}

/// Exact (non-normalized) names present in every table, in first-table order.
pub fn common_columns<T: Borrow<Table>>(tables: &[T]) -> Vec<String> {
    let Some(first) = tables.first() else {
        return Vec::new();
    };
    first
        .borrow()
        .column_names()
        .into_iter()
        .filter(|name| tables.iter().all(|t| t.borrow().contains_column(name)))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deduplicate_keeps_first_occurrence_order() {
        let t = Table::from_values(vec![
            ("a", vec![Value::Int(2), Value::Int(1), Value::Int(2), Value::Int(1)]),
            ("b", vec![Value::from("x"), Value::from("y"), Value::from("x"), Value::from("z")]),
        ])
        .unwrap();
        let d = deduplicate(&t);
        assert_eq!(d.row_count(), 3);
        assert_eq!(d.column("a").unwrap().values(), &[Value::Int(2), Value::Int(1), Value::Int(1)]);
        assert_eq!(d.column("b").unwrap().values()[2], Value::from("z"));
    }

    #[test]
    fn deduplicate_treats_nulls_as_equal() {
        let t = Table::from_values(vec![("a", vec![Value::Null, Value::Null])]).unwrap();
        assert_eq!(deduplicate(&t).row_count(), 1);
    }

    #[test]
    fn clean_drops_empty_rows_and_trims() {
        let t = Table::from_values(vec![
            ("name", vec![Value::from("  Ann "), Value::Null, Value::from("Bo")]),
            ("n", vec![Value::Int(1), Value::Null, Value::Null]),
        ])
        .unwrap();
        let (cleaned, stats) = clean(&t, &[]).unwrap();
        assert_eq!(stats, CleanStats { empty_rows_removed: 1, cells_trimmed: 1 });
        assert_eq!(cleaned.row_count(), 2);
        assert_eq!(cleaned.column("name").unwrap().values()[0], Value::from("Ann"));
        assert_eq!(cleaned.column_names(), vec!["name", "n"]);
    }

    #[test]
    fn clean_ignores_excluded_columns() {
        let t = Table::from_values(vec![
            ("id", vec![Value::Int(1), Value::Null]),
            ("source", vec![Value::from(" a "), Value::from("a")]),
        ])
        .unwrap();
        let (cleaned, stats) = clean(&t, &["source"]).unwrap();
        assert_eq!(stats, CleanStats { empty_rows_removed: 1, cells_trimmed: 0 });
        assert_eq!(cleaned.column("source").unwrap().values(), &[Value::from(" a ")]);

        let (kept, _) = clean(&t, &[]).unwrap();
        assert_eq!(kept.row_count(), 2);
    }

    #[test]
    fn common_columns_is_exact() {
        let tables = [
            Table::from_values(vec![("id", vec![]), ("Name", vec![])]).unwrap(),
            Table::from_values(vec![("name", vec![]), ("id", vec![])]).unwrap(),
        ];
        assert_eq!(common_columns(&tables), vec!["id"]);
        assert!(common_columns::<Table>(&[]).is_empty());
    }
}
