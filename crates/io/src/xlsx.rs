// Excel import (xlsx, xls) and xlsx export

use std::fmt::Display;
use std::io::{Cursor, Read, Seek};

use calamine::{Data, Range, Reader, Xls, Xlsx};
use chrono::NaiveDateTime;
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook, Worksheet, XlsxError};

use sheetmerge_core::{Column, ColumnKind, Table, TableWriter, Value, WriteError};

use crate::reader::{DecodeResult, FileFormat, SheetTable};
use crate::sheet::{build_table, columns_from_rows, unique_headers};

/// Excel grid limits.
pub const MAX_ROWS: usize = 1_048_576;
pub const MAX_COLS: usize = 16_384;

pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Serial day number of 1970-01-01 in the 1900 date system.
const UNIX_EPOCH_SERIAL: f64 = 25_569.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Decode every non-empty sheet of a workbook, in workbook order.
pub fn read_sheets(bytes: &[u8], format: FileFormat) -> DecodeResult<Vec<SheetTable>> {
    let cursor = Cursor::new(bytes);
    match format {
        FileFormat::Xlsx => {
            let mut workbook: Xlsx<_> =
                Xlsx::new(cursor).map_err(|e| format!("failed to open workbook: {e}"))?;
            read_workbook(&mut workbook)
        }
        FileFormat::Xls => {
            let mut workbook: Xls<_> =
                Xls::new(cursor).map_err(|e| format!("failed to open workbook: {e}"))?;
            read_workbook(&mut workbook)
        }
        FileFormat::Csv => Err("not a workbook format".to_string()),
    }
}

fn read_workbook<RS, R>(workbook: &mut R) -> DecodeResult<Vec<SheetTable>>
where
    RS: Read + Seek,
    R: Reader<RS>,
    R::Error: Display,
{
    let sheet_names = workbook.sheet_names();
    if sheet_names.is_empty() {
        return Err("workbook contains no sheets".to_string());
    }

    let mut tables = Vec::with_capacity(sheet_names.len());
    for (idx, sheet_name) in sheet_names.iter().enumerate() {
        let range = workbook
            .worksheet_range(sheet_name)
            .map_err(|e| format!("failed to read sheet '{sheet_name}': {e}"))?;

        if range.is_empty() {
            tracing::warn!(sheet = %sheet_name, "skipping empty sheet");
            continue;
        }

        let table = sheet_table(&range).map_err(|e| format!("sheet '{sheet_name}': {e}"))?;
        tables.push(SheetTable {
            table,
            sheet_name: Some(sheet_name.clone()),
            ordinal: idx + 1,
        });
    }

    if tables.is_empty() {
        return Err("every sheet in the workbook is empty".to_string());
    }
    Ok(tables)
}

/// First row of the used range is the header; the rest are records.
fn sheet_table(range: &Range<Data>) -> DecodeResult<Table> {
    let mut rows = range.rows();
    let raw_headers: Vec<String> = rows
        .next()
        .map(|header| header.iter().map(header_text).collect())
        .unwrap_or_default();
    let headers = unique_headers(&raw_headers);

    let records: Vec<Vec<Value>> = rows.map(|row| row.iter().map(cell_value).collect()).collect();
    let columns = columns_from_rows(headers.len(), records);

    let columns = headers
        .into_iter()
        .zip(columns)
        .map(|(name, values)| sheet_column(name, values))
        .collect();
    build_table(columns)
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Value::Float(n) if is_whole(n) => format!("{}", n as i64),
        other => other.to_string(),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::Str(s.clone()),
        Data::Float(n) => Value::Float(*n),
        Data::Int(n) => Value::Int(*n),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Value::DateTime)
            .unwrap_or_else(|| Value::Float(dt.as_f64())),
        Data::DateTimeIso(s) => s
            .parse::<NaiveDateTime>()
            .map(Value::DateTime)
            .unwrap_or_else(|_| Value::Str(s.clone())),
        Data::DurationIso(s) => Value::Str(s.clone()),
    }
}

/// Workbooks store every number as a float; a column of whole numbers reads as integers.
fn sheet_column(name: String, values: Vec<Value>) -> Column {
    let whole = values.iter().any(|v| !v.is_null())
        && values.iter().all(|v| match v {
            Value::Null | Value::Int(_) => true,
            Value::Float(n) => is_whole(*n),
            _ => false,
        });
    if !whole {
        return Column::infer(name, values);
    }
    let values = values
        .into_iter()
        .map(|v| match v {
            Value::Float(n) => Value::Int(n as i64),
            other => other,
        })
        .collect();
    Column::infer(name, values)
}

fn is_whole(n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

/// Single-worksheet xlsx encoder: bold header row, typed cells, blank nulls.
#[derive(Debug, Clone, Default)]
pub struct XlsxTableWriter {
    sheet_name: Option<String>,
}

impl XlsxTableWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet_name(name: impl Into<String>) -> Self {
        Self { sheet_name: Some(name.into()) }
    }
}

impl TableWriter for XlsxTableWriter {
    fn format_name(&self) -> &'static str {
        "xlsx"
    }

    fn mime_type(&self) -> &'static str {
        XLSX_MIME_TYPE
    }

    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn write(&self, table: &Table) -> Result<Vec<u8>, WriteError> {
        check_dimensions(table.row_count(), table.column_count())?;

        let mut workbook = XlsxWorkbook::new();
        let worksheet = workbook.add_worksheet();
        if let Some(name) = &self.sheet_name {
            worksheet.set_name(name).map_err(encode_error)?;
        }
        write_sheet(worksheet, table).map_err(encode_error)?;
        workbook.save_to_buffer().map_err(encode_error)
    }
}

/// Data rows plus the header row must fit the Excel grid.
fn check_dimensions(rows: usize, columns: usize) -> Result<(), WriteError> {
    if rows + 1 > MAX_ROWS || columns > MAX_COLS {
        return Err(WriteError::TooLarge {
            format: "xlsx",
            rows,
            columns,
            max_rows: MAX_ROWS - 1,
            max_columns: MAX_COLS,
        });
    }
    Ok(())
}

fn write_sheet(worksheet: &mut Worksheet, table: &Table) -> Result<(), XlsxError> {
    let header_format = Format::new().set_bold();
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (col_idx, column) in table.columns().iter().enumerate() {
        let col = col_idx as u16;
        worksheet.write_string_with_format(0, col, column.name(), &header_format)?;

        for (row_idx, value) in column.values().iter().enumerate() {
            let row = row_idx as u32 + 1;
            match value {
                Value::Null => {}
                Value::Int(n) => {
                    worksheet.write_number(row, col, *n as f64)?;
                }
                Value::Float(n) if n.is_finite() => {
                    worksheet.write_number(row, col, *n)?;
                }
                Value::Float(n) => {
                    worksheet.write_string(row, col, n.to_string())?;
                }
                Value::Bool(b) => {
                    worksheet.write_boolean(row, col, *b)?;
                }
                Value::Str(s) => {
                    worksheet.write_string(row, col, s)?;
                }
                Value::DateTime(dt) => {
                    worksheet.write_number_with_format(
                        row,
                        col,
                        excel_serial(dt),
                        &datetime_format,
                    )?;
                }
            }
        }

        if column.kind() == ColumnKind::DateTime {
            worksheet.set_column_width(col, 20)?;
        }
    }
    Ok(())
}

fn excel_serial(dt: &NaiveDateTime) -> f64 {
    UNIX_EPOCH_SERIAL + dt.and_utc().timestamp_millis() as f64 / MILLIS_PER_DAY
}

fn encode_error(e: XlsxError) -> WriteError {
    WriteError::Encode { format: "xlsx", message: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn sample() -> Table {
        Table::from_values(vec![
            ("id", vec![Value::Int(1), Value::Int(2)]),
            ("name", vec![Value::from("Ann"), Value::from("Bo")]),
            ("active", vec![Value::Bool(true), Value::Bool(false)]),
            ("score", vec![Value::Float(1.5), Value::Null]),
            ("joined", vec![Value::DateTime(midnight(2024, 1, 31)), Value::Null]),
        ])
        .unwrap()
    }

    #[test]
    fn test_export_reads_back_with_kinds() {
        let bytes = XlsxTableWriter::new().write(&sample()).unwrap();
        let sheets = read_sheets(&bytes, FileFormat::Xlsx).unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].sheet_name.as_deref(), Some("Sheet1"));

        let table = &sheets[0].table;
        assert_eq!(table.column_names(), vec!["id", "name", "active", "score", "joined"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("id").unwrap().kind(), ColumnKind::Integer);
        assert_eq!(table.column("active").unwrap().kind(), ColumnKind::Boolean);
        assert_eq!(table.column("score").unwrap().values(), &[Value::Float(1.5), Value::Null]);
        assert_eq!(
            table.column("joined").unwrap().values()[0],
            Value::DateTime(midnight(2024, 1, 31))
        );
    }

    #[test]
    fn test_export_metadata() {
        let writer = XlsxTableWriter::with_sheet_name("Merged");
        assert_eq!(writer.extension(), "xlsx");
        assert_eq!(writer.mime_type(), XLSX_MIME_TYPE);
        let bytes = writer.write(&sample()).unwrap();
        // xlsx is a zip container
        assert_eq!(&bytes[..2], b"PK");
        let sheets = read_sheets(&bytes, FileFormat::Xlsx).unwrap();
        assert_eq!(sheets[0].sheet_name.as_deref(), Some("Merged"));
    }

    #[test]
    fn test_multiple_sheets_skip_empty() {
        let mut workbook = XlsxWorkbook::new();
        let q1 = workbook.add_worksheet().set_name("Q1").unwrap();
        q1.write_string(0, 0, "region").unwrap();
        q1.write_string(1, 0, "north").unwrap();
        workbook.add_worksheet().set_name("Blank").unwrap();
        let q2 = workbook.add_worksheet().set_name("Q2").unwrap();
        q2.write_string(0, 0, "region").unwrap();
        q2.write_string(1, 0, "south").unwrap();
        q2.write_string(2, 0, "east").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let sheets = read_sheets(&bytes, FileFormat::Xlsx).unwrap();
        let names: Vec<_> = sheets.iter().map(|s| s.sheet_name.clone().unwrap()).collect();
        assert_eq!(names, vec!["Q1", "Q2"]);
        assert_eq!(sheets[0].ordinal, 1);
        assert_eq!(sheets[1].ordinal, 3);
        assert_eq!(sheets[1].table.row_count(), 2);
    }

    #[test]
    fn test_all_empty_workbook_fails() {
        let mut workbook = XlsxWorkbook::new();
        workbook.add_worksheet();
        let bytes = workbook.save_to_buffer().unwrap();
        assert!(read_sheets(&bytes, FileFormat::Xlsx).is_err());
    }

    #[test]
    fn test_numeric_headers_and_mixed_columns() {
        let mut workbook = XlsxWorkbook::new();
        let ws = workbook.add_worksheet();
        ws.write_number(0, 0, 2024).unwrap();
        ws.write_string(0, 1, "note").unwrap();
        ws.write_number(1, 0, 1.25).unwrap();
        ws.write_number(1, 1, 7).unwrap();
        ws.write_number(2, 0, 3).unwrap();
        ws.write_string(2, 1, "seven").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let table = &read_sheets(&bytes, FileFormat::Xlsx).unwrap()[0].table;
        assert_eq!(table.column_names(), vec!["2024", "note"]);
        assert_eq!(table.column("2024").unwrap().kind(), ColumnKind::Float);
        let note = table.column("note").unwrap();
        assert_eq!(note.kind(), ColumnKind::String);
        assert_eq!(note.values(), &[Value::from("7"), Value::from("seven")]);
    }

    #[test]
    fn test_dimension_limits() {
        assert!(check_dimensions(MAX_ROWS - 1, MAX_COLS).is_ok());
        assert!(matches!(
            check_dimensions(MAX_ROWS, 1),
            Err(WriteError::TooLarge { .. })
        ));
        assert!(check_dimensions(1, MAX_COLS + 1).is_err());
    }
}
