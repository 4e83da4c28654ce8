// Cell values

use std::fmt;

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::column::ColumnKind;

/// Display format for datetime values (matches what spreadsheet users expect in CSV output).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single cell value. Every non-null variant corresponds to exactly one [`ColumnKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The kind this value naturally belongs to. Strings report `String`;
    /// categorical is a column-level property.
    pub fn kind(&self) -> ColumnKind {
        match self {
            Value::Null => ColumnKind::Null,
            Value::Int(_) => ColumnKind::Integer,
            Value::Float(_) => ColumnKind::Float,
            Value::Bool(_) => ColumnKind::Boolean,
            Value::Str(_) => ColumnKind::String,
            Value::DateTime(_) => ColumnKind::DateTime,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Hashable identity of the value, used for distinct counts and row dedup.
    /// Floats compare by total order, so NaN equals NaN here.
    pub fn key(&self) -> ValueKey<'_> {
        match self {
            Value::Null => ValueKey::Null,
            Value::Int(n) => ValueKey::Int(*n),
            Value::Float(n) => ValueKey::Float(OrderedFloat(*n)),
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Str(s) => ValueKey::Str(s),
            Value::DateTime(dt) => ValueKey::DateTime(*dt),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Str(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKey<'a> {
    Null,
    Int(i64),
    Float(OrderedFloat<f64>),
    Bool(bool),
    Str(&'a str),
    DateTime(NaiveDateTime),
}
