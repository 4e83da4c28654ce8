// CSV/TSV decoding and CSV output

use std::io::Write;

use chrono::{NaiveDate, NaiveDateTime};

use sheetmerge_core::{Column, ColumnKind, Table, Value};

use crate::reader::{DecodeResult, ReadOptions};
use crate::sheet::{build_table, unique_headers};

const DATETIME_PATTERNS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Decode a delimited file into one table. The first record is the header.
pub fn read_table(bytes: &[u8], options: &ReadOptions) -> DecodeResult<Table> {
    let content = decode_text(bytes);
    let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
    if content.trim().is_empty() {
        return Err("file has no header row".to_string());
    }

    let delimiter = match options.delimiter {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => return Err(format!("delimiter '{c}' is not a single-byte character")),
        None => sniff_delimiter(content),
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_reader(content.as_bytes());

    let raw_headers: Vec<String> = reader
        .headers()
        .map_err(|e| e.to_string())?
        .iter()
        .map(str::to_string)
        .collect();
    let headers = unique_headers(&raw_headers);

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for result in reader.records() {
        let record = result.map_err(|e| e.to_string())?;
        for (column, field) in cells.iter_mut().zip(record.iter()) {
            let is_null = options.null_values.iter().any(|token| token == field);
            column.push(if is_null { None } else { Some(field.to_string()) });
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, cells)| text_column(name, cells, options.parse_dates))
        .collect::<DecodeResult<Vec<_>>>()?;
    build_table(columns)
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.is_empty()).take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        // More agreeing lines and more fields both point at the real delimiter
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// UTF-8 when valid, otherwise Windows-1252 (common for Excel-exported CSVs).
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Pick the narrowest kind every non-null cell parses as.
fn text_column(
    name: String,
    cells: Vec<Option<String>>,
    parse_dates: bool,
) -> DecodeResult<Column> {
    let present = || cells.iter().flatten();
    let (kind, values): (ColumnKind, Vec<Value>) = if present().next().is_none() {
        (ColumnKind::Null, cells.iter().map(|_| Value::Null).collect())
    } else if present().all(|s| s.parse::<i64>().is_ok()) {
        (ColumnKind::Integer, parse_all(&cells, |s| s.parse().ok().map(Value::Int)))
    } else if present().all(|s| s.parse::<f64>().is_ok()) {
        (ColumnKind::Float, parse_all(&cells, |s| s.parse().ok().map(Value::Float)))
    } else if present().all(|s| parse_bool(s).is_some()) {
        (ColumnKind::Boolean, parse_all(&cells, |s| parse_bool(s).map(Value::Bool)))
    } else if parse_dates && present().all(|s| parse_datetime(s).is_some()) {
        (ColumnKind::DateTime, parse_all(&cells, |s| parse_datetime(s).map(Value::DateTime)))
    } else {
        (ColumnKind::String, parse_all(&cells, |s| Some(Value::Str(s.to_string()))))
    };
    Column::new(name, kind, values).map_err(|e| e.to_string())
}

fn parse_all(cells: &[Option<String>], parse: impl Fn(&str) -> Option<Value>) -> Vec<Value> {
    cells
        .iter()
        .map(|cell| cell.as_deref().and_then(&parse).unwrap_or(Value::Null))
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_PATTERNS
        .iter()
        .find_map(|p| NaiveDateTime::parse_from_str(s, p).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Write a table as comma-separated text with a header row. Nulls are empty fields.
pub fn write_table<W: Write>(table: &Table, out: W) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new().from_writer(out);
    writer.write_record(table.column_names())?;
    for row in 0..table.row_count() {
        let record: Vec<String> = table
            .columns()
            .iter()
            .map(|c| c.get(row).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
