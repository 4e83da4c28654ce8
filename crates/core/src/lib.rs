//! `sheetmerge-core`: tabular data model shared by the reader, merge engine and writers.

pub mod column;
pub mod table;
pub mod value;
pub mod writer;

pub use column::{Column, ColumnKind};
pub use table::{Table, TableError};
pub use value::{Value, ValueKey};
pub use writer::{TableWriter, WriteError};
