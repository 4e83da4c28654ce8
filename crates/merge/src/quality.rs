//! Read-only data quality profiling.

use ordered_float::OrderedFloat;
use serde::Serialize;

use sheetmerge_core::{Column, ColumnKind, Table};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    pub null_count: usize,
    pub unique_count: usize,
    pub null_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityReport {
    pub total_rows: usize,
    pub total_columns: usize,
    pub total_nulls: usize,
    pub null_percentage: f64,
    pub estimated_memory_bytes: usize,
    /// One profile per column, in table order.
    pub columns: Vec<ColumnProfile>,
}

impl QualityReport {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnValidation {
    pub valid: bool,
    pub missing_columns: Vec<String>,
    pub existing_columns: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DataQualityValidator;

impl DataQualityValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn summarize(&self, table: &Table) -> QualityReport {
        let rows = table.row_count();
        let columns: Vec<ColumnProfile> =
            table.columns().iter().map(|c| profile(c, rows)).collect();
        let total_nulls = columns.iter().map(|c| c.null_count).sum();
        QualityReport {
            total_rows: rows,
            total_columns: table.column_count(),
            total_nulls,
            null_percentage: percentage(total_nulls, rows * table.column_count()),
            estimated_memory_bytes: table.estimated_size(),
            columns,
        }
    }

    /// Structural check only: are the required columns present?
    pub fn validate<S: AsRef<str>>(&self, table: &Table, required: &[S]) -> ColumnValidation {
        let missing_columns = table.missing_columns(required);
        ColumnValidation {
            valid: missing_columns.is_empty(),
            missing_columns,
            existing_columns: table.column_names().iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn profile(column: &Column, rows: usize) -> ColumnProfile {
    let null_count = column.null_count();
    let mut profile = ColumnProfile {
        name: column.name().to_string(),
        kind: column.kind(),
        null_count,
        unique_count: column.unique_count(),
        null_percentage: percentage(null_count, rows),
        min: None,
        max: None,
        mean: None,
        median: None,
    };

    if column.kind().is_numeric() {
        let mut numbers: Vec<OrderedFloat<f64>> = column
            .values()
            .iter()
            .filter_map(|v| v.as_f64())
            .filter(|n| !n.is_nan())
            .map(OrderedFloat)
            .collect();
        if !numbers.is_empty() {
            numbers.sort_unstable();
            let n = numbers.len();
            profile.min = Some(numbers[0].0);
            profile.max = Some(numbers[n - 1].0);
            profile.mean = Some(numbers.iter().map(|x| x.0).sum::<f64>() / n as f64);
            profile.median = Some(if n % 2 == 1 {
                numbers[n / 2].0
            } else {
                (numbers[n / 2 - 1].0 + numbers[n / 2].0) / 2.0
            });
        }
    }
    profile
}
