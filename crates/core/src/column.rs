// Typed columns

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::table::TableError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    String,
    #[serde(rename = "datetime")]
    DateTime,
    Categorical,
    Null,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::DateTime => "datetime",
            Self::Categorical => "categorical",
            Self::Null => "null",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String | Self::Categorical)
    }

    /// Common kind for two columns stacked on top of each other.
    ///
    /// Null joins anything, integer widens to float, categorical relaxes to
    /// string; everything else falls back to string.
    pub fn unify(self, other: ColumnKind) -> ColumnKind {
        use ColumnKind::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Null, k) | (k, Null) => k,
            (Integer, Float) | (Float, Integer) => Float,
            _ => String,
        }
    }

    /// Whether a value may be stored in a column of this kind.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer, Value::Int(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Boolean, Value::Bool(_)) => true,
            (Self::String | Self::Categorical, Value::Str(_)) => true,
            (Self::DateTime, Value::DateTime(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed column. The kind never changes; `cast` and friends return new columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<Value>,
}

impl Column {
    /// Build a column, checking every value against `kind`.
    pub fn new(
        name: impl Into<String>,
        kind: ColumnKind,
        values: Vec<Value>,
    ) -> Result<Self, TableError> {
        let name = name.into();
        if let Some(bad) = values.iter().find(|v| !kind.admits(v)) {
            return Err(TableError::KindMismatch {
                column: name,
                expected: kind,
                found: bad.kind(),
            });
        }
        Ok(Self { name, kind, values })
    }

    /// Build a column whose kind is derived from its values.
    ///
    /// All null gives `Null`; a single value kind is kept; integers mixed with
    /// floats become floats; anything else is rendered as text.
    pub fn infer(name: impl Into<String>, values: Vec<Value>) -> Self {
        let kind = values
            .iter()
            .filter(|v| !v.is_null())
            .fold(ColumnKind::Null, |acc, v| acc.unify(v.kind()));
        let values = values.into_iter().map(|v| convert(v, kind)).collect();
        Self { name: name.into(), kind, values }
    }

    /// Column of `len` copies of one value.
    pub fn constant(name: impl Into<String>, value: Value, len: usize) -> Self {
        let kind = value.kind();
        Self { name: name.into(), kind, values: vec![value; len] }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<&Value> {
        self.values.get(row)
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Distinct values, counting null as one value when present.
    pub fn unique_count(&self) -> usize {
        self.values.iter().map(Value::key).collect::<HashSet<_>>().len()
    }

    pub fn renamed(&self, name: impl Into<String>) -> Column {
        Column { name: name.into(), kind: self.kind, values: self.values.clone() }
    }

    /// Re-type the column. Conversions follow [`ColumnKind::unify`]: integer to
    /// float is numeric, everything else to string/categorical is textual.
    pub fn cast(&self, kind: ColumnKind) -> Result<Column, TableError> {
        if kind == self.kind {
            return Ok(self.clone());
        }
        let widening = self.kind == ColumnKind::Null
            || kind.is_textual()
            || (self.kind == ColumnKind::Integer && kind == ColumnKind::Float);
        if !widening {
            return Err(TableError::InvalidCast {
                column: self.name.clone(),
                from: self.kind,
                to: kind,
            });
        }
        let values = self.values.iter().cloned().map(|v| convert(v, kind)).collect();
        Ok(Column { name: self.name.clone(), kind, values })
    }

    /// Same values, new textual kind. Only valid between string and categorical.
    pub fn with_text_kind(&self, kind: ColumnKind) -> Result<Column, TableError> {
        if !self.kind.is_textual() || !kind.is_textual() {
            return Err(TableError::InvalidCast {
                column: self.name.clone(),
                from: self.kind,
                to: kind,
            });
        }
        Ok(Column { name: self.name.clone(), kind, values: self.values.clone() })
    }

    /// Rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Column {
        let values = indices
            .iter()
            .map(|&i| self.values.get(i).cloned().unwrap_or(Value::Null))
            .collect();
        Column { name: self.name.clone(), kind: self.kind, values }
    }

    /// Map every value, keeping the kind. Values the kind does not admit are rejected.
    pub fn map_values(&self, f: impl Fn(&Value) -> Value) -> Result<Column, TableError> {
        Column::new(self.name.clone(), self.kind, self.values.iter().map(f).collect())
    }

    pub(crate) fn append(&mut self, other: &Column) {
        self.values.extend(other.values.iter().cloned());
    }

    /// Logical in-memory footprint in bytes, modelled on columnar storage:
    /// fixed-width buffers, string payload plus offsets, dictionary for
    /// categoricals, and a validity bitmap once any null is present.
    pub fn estimated_size(&self) -> usize {
        let len = self.values.len();
        let data = match self.kind {
            ColumnKind::Integer | ColumnKind::Float | ColumnKind::DateTime => 8 * len,
            ColumnKind::Boolean => len.div_ceil(8),
            ColumnKind::String => {
                let payload: usize =
                    self.values.iter().filter_map(Value::as_str).map(str::len).sum();
                payload + 8 * len
            }
            ColumnKind::Categorical => {
                let dictionary: HashSet<&str> =
                    self.values.iter().filter_map(Value::as_str).collect();
                let payload: usize = dictionary.iter().map(|s| s.len() + 8).sum();
                payload + 4 * len
            }
            ColumnKind::Null => return 0,
        };
        let validity = if self.values.iter().any(Value::is_null) { len.div_ceil(8) } else { 0 };
        data + validity
    }
}

fn convert(value: Value, kind: ColumnKind) -> Value {
    match (value, kind) {
        (Value::Null, _) => Value::Null,
        (Value::Int(n), ColumnKind::Float) => Value::Float(n as f64),
        (Value::Str(s), ColumnKind::String | ColumnKind::Categorical) => Value::Str(s),
        (other, ColumnKind::String | ColumnKind::Categorical) => Value::Str(other.to_string()),
        (other, _) => other,
    }
}
