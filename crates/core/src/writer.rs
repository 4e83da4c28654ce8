// Output capability for encoded table formats

use thiserror::Error;

use crate::table::Table;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error(
        "{rows} rows x {columns} columns exceeds the {format} limit of {max_rows} x {max_columns}"
    )]
    TooLarge {
        format: &'static str,
        rows: usize,
        columns: usize,
        max_rows: usize,
        max_columns: usize,
    },
    #[error("{format} encoding failed: {message}")]
    Encode { format: &'static str, message: String },
}

/// Encodes a table into a self-contained file payload.
///
/// Implementations are stateless: the same table always produces an
/// equivalent payload, and nothing is written to disk.
pub trait TableWriter: Send + Sync {
    /// Short human name, e.g. `"xlsx"`.
    fn format_name(&self) -> &'static str;

    fn mime_type(&self) -> &'static str;

    /// File extension without the leading dot.
    fn extension(&self) -> &'static str;

    fn write(&self, table: &Table) -> Result<Vec<u8>, WriteError>;
}
