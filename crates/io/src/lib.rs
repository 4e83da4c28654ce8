// File I/O operations

pub mod batch;
pub mod csv;
pub mod reader;
mod sheet;
pub mod xlsx;

pub use batch::{BatchReader, CancellationToken, FileOutcome, UploadedFile};
pub use reader::{FileFormat, ReadError, ReadOptions, SheetTable, TableReader, SUPPORTED_EXTENSIONS};
pub use xlsx::XlsxTableWriter;
