// Format detection and single-file reading

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sheetmerge_core::Table;

use crate::{csv, xlsx};

/// Extensions accepted by [`TableReader::read`], lower-case with leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".csv", ".xlsx", ".xls"];

/// Files above this size are rejected before decoding (100 MiB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Xlsx,
    Xls,
}

impl FileFormat {
    /// Detect the format from the file name's extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            _ => None,
        }
    }

    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, Self::Xlsx | Self::Xls)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => write!(f, "csv"),
            Self::Xlsx => write!(f, "xlsx"),
            Self::Xls => write!(f, "xls"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReadError {
    #[error(
        "unsupported file format: '{file_name}' (supported: {})",
        SUPPORTED_EXTENSIONS.join(", ")
    )]
    UnsupportedFormat { file_name: String },
    #[error("cannot decode '{file_name}' as {format}: {message}")]
    Decode { file_name: String, format: FileFormat, message: String },
    #[error("'{file_name}' is {size} bytes, above the {limit} byte limit")]
    TooLarge { file_name: String, size: u64, limit: u64 },
    #[error("read of '{file_name}' was cancelled")]
    Cancelled { file_name: String },
}

impl ReadError {
    pub fn file_name(&self) -> &str {
        match self {
            Self::UnsupportedFormat { file_name }
            | Self::Decode { file_name, .. }
            | Self::TooLarge { file_name, .. }
            | Self::Cancelled { file_name } => file_name,
        }
    }
}

/// Error detail produced by the format decoders before the file name is attached.
pub(crate) type DecodeResult<T> = Result<T, String>;

/// Reader settings. Loaded from the `[reader]` settings section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// Field delimiter for delimited files. `None` sniffs it from the content.
    pub delimiter: Option<char>,
    /// Cell texts read as null in delimited files.
    pub null_values: Vec<String>,
    /// Try to read delimited columns as datetimes.
    pub parse_dates: bool,
    /// Maximum accepted file size in bytes. 0 disables the check.
    pub max_file_size: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            null_values: ["", "NULL", "null", "NA", "na"].iter().map(|s| s.to_string()).collect(),
            parse_dates: false,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// One decoded table from a file. Delimited files yield a single table with
/// no sheet name; workbooks yield one per non-empty sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub table: Table,
    pub sheet_name: Option<String>,
    /// 1-based position of the sheet within its workbook.
    pub ordinal: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TableReader {
    options: ReadOptions,
}

impl TableReader {
    pub fn new(options: ReadOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn supported_extensions() -> &'static [&'static str] {
        SUPPORTED_EXTENSIONS
    }

    /// Decode one uploaded file into its tables.
    pub fn read(&self, bytes: &[u8], file_name: &str) -> Result<Vec<SheetTable>, ReadError> {
        let format = FileFormat::from_file_name(file_name)
            .ok_or_else(|| ReadError::UnsupportedFormat { file_name: file_name.to_string() })?;

        let size = bytes.len() as u64;
        if self.options.max_file_size > 0 && size > self.options.max_file_size {
            return Err(ReadError::TooLarge {
                file_name: file_name.to_string(),
                size,
                limit: self.options.max_file_size,
            });
        }

        let decoded = if bytes.is_empty() {
            Err("file is empty".to_string())
        } else {
            match format {
                FileFormat::Csv => csv::read_table(bytes, &self.options).map(|table| {
                    vec![SheetTable { table, sheet_name: None, ordinal: 1 }]
                }),
                FileFormat::Xlsx | FileFormat::Xls => xlsx::read_sheets(bytes, format),
            }
        };

        let tables = decoded.map_err(|message| ReadError::Decode {
            file_name: file_name.to_string(),
            format,
            message,
        })?;
        tracing::debug!(file = file_name, %format, tables = tables.len(), "decoded file");
        Ok(tables)
    }
}
