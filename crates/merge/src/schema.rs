//! Schema reconciliation: decides the merged column list and how each input
//! table is reshaped to fit it.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use sheetmerge_core::{Table, TableError};

use crate::config::MergeMode;
use crate::error::MergeError;

/// How one table's columns differ from the reference (first) table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    pub table_index: usize,
    /// In the reference table but not in this one.
    pub missing: Vec<String>,
    /// In this table but not in the reference.
    pub extra: Vec<String>,
    /// Same names as the reference, different order.
    pub reordered: bool,
}

impl SchemaDiff {
    pub fn is_match(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && !self.reordered
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {}:", self.table_index)?;
        if !self.missing.is_empty() {
            write!(f, " missing [{}]", self.missing.join(", "))?;
        }
        if !self.extra.is_empty() {
            write!(f, " extra [{}]", self.extra.join(", "))?;
        }
        if self.reordered {
            write!(f, " columns in a different order")?;
        }
        Ok(())
    }
}

/// Reshape applied to one input table: `(source_name, target_name)` pairs in
/// output order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub columns: Vec<(String, String)>,
}

impl Projection {
    fn identity(table: &Table) -> Self {
        Self {
            columns: table
                .column_names()
                .into_iter()
                .map(|n| (n.to_string(), n.to_string()))
                .collect(),
        }
    }

    pub fn apply(&self, table: &Table) -> Result<Table, TableError> {
        table.project(&self.columns)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Output column order.
    pub columns: Vec<String>,
    /// One projection per input table, same order as the input.
    pub projections: Vec<Projection>,
}

/// Lower-case, trimmed, internal spaces replaced by underscores.
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

pub fn reconcile(tables: &[Table], mode: MergeMode) -> Result<Reconciliation, MergeError> {
    if tables.is_empty() {
        return Err(MergeError::EmptyMerge);
    }
    match mode {
        MergeMode::Strict => reconcile_strict(tables),
        MergeMode::Intersection => reconcile_intersection(tables),
    }
}

/// Compare `other` against `reference` by name.
pub fn schema_diff(table_index: usize, reference: &[&str], other: &[&str]) -> SchemaDiff {
    let ref_set: HashSet<&str> = reference.iter().copied().collect();
    let other_set: HashSet<&str> = other.iter().copied().collect();
    let missing: Vec<String> = reference
        .iter()
        .filter(|n| !other_set.contains(*n))
        .map(|n| n.to_string())
        .collect();
    let extra: Vec<String> = other
        .iter()
        .filter(|n| !ref_set.contains(*n))
        .map(|n| n.to_string())
        .collect();
    let reordered = missing.is_empty() && extra.is_empty() && reference != other;
    SchemaDiff { table_index, missing, extra, reordered }
}

fn reconcile_strict(tables: &[Table]) -> Result<Reconciliation, MergeError> {
    let reference = tables[0].column_names();
    let mismatches: Vec<SchemaDiff> = tables
        .iter()
        .enumerate()
        .skip(1)
        .map(|(idx, t)| schema_diff(idx, &reference, &t.column_names()))
        .filter(|d| !d.is_match())
        .collect();
    if !mismatches.is_empty() {
        return Err(MergeError::SchemaMismatch { mismatches });
    }
    Ok(Reconciliation {
        columns: reference.iter().map(|s| s.to_string()).collect(),
        projections: tables.iter().map(Projection::identity).collect(),
    })
}

fn reconcile_intersection(tables: &[Table]) -> Result<Reconciliation, MergeError> {
    // Per table: normalized name -> original name, first occurrence wins
    let normalized: Vec<Vec<(String, String)>> = tables
        .iter()
        .map(|t| {
            let mut seen = HashSet::new();
            t.column_names()
                .into_iter()
                .map(|orig| (normalize_column_name(orig), orig.to_string()))
                .filter(|(norm, _)| seen.insert(norm.clone()))
                .collect()
        })
        .collect();

    let per_table_sets: Vec<HashSet<&str>> = normalized
        .iter()
        .map(|cols| cols.iter().map(|(n, _)| n.as_str()).collect())
        .collect();

    // First-seen order across tables in input order
    let mut columns: Vec<String> = Vec::new();
    let mut placed: HashSet<&str> = HashSet::new();
    for cols in &normalized {
        for (norm, _) in cols {
            if placed.contains(norm.as_str()) {
                continue;
            }
            if per_table_sets.iter().all(|set| set.contains(norm.as_str())) {
                placed.insert(norm.as_str());
                columns.push(norm.clone());
            }
        }
    }

    if columns.is_empty() {
        return Err(MergeError::NoCommonColumns { tables: tables.len() });
    }

    let projections = normalized
        .iter()
        .map(|cols| Projection {
            columns: columns
                .iter()
                .filter_map(|target| {
                    cols.iter()
                        .find(|(norm, _)| norm == target)
                        .map(|(_, orig)| (orig.clone(), target.clone()))
                })
                .collect(),
        })
        .collect();

    Ok(Reconciliation { columns, projections })
}
