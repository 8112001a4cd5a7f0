use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ReportError;
use crate::types::{CellValue, RawTable};
use crate::util::{excel_serial_to_date, parse_date_permissive};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// xlsx, xlsm, xls, xlsb or ods; anything calamine can open.
    Workbook,
    Csv,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") | Some("tsv") | Some("txt") => InputFormat::Csv,
            _ => InputFormat::Workbook,
        }
    }
}

/// Read a file into a raw table. Any failure here is structural: the request
/// stops and nothing partial is returned.
pub fn load_table(path: &Path, sheet: usize) -> Result<RawTable, ReportError> {
    let bytes = std::fs::read(path)
        .map_err(|e| ReportError::Structural(format!("{}: {}", path.display(), e)))?;
    read_table(&bytes, InputFormat::from_path(path), sheet)
}

pub fn read_table(bytes: &[u8], format: InputFormat, sheet: usize) -> Result<RawTable, ReportError> {
    let table = match format {
        InputFormat::Workbook => read_workbook(bytes, sheet)?,
        InputFormat::Csv => read_csv(bytes)?,
    };
    info!(
        rows = table.rows.len(),
        columns = table.width(),
        ?format,
        "table loaded"
    );
    Ok(table)
}

fn read_workbook(bytes: &[u8], sheet: usize) -> Result<RawTable, ReportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ReportError::Structural(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(sheet)
        .ok_or_else(|| ReportError::Structural(format!("workbook has no sheet at index {}", sheet)))?
        .map_err(|e| ReportError::Structural(e.to_string()))?;

    // Range start offset (data may not begin at A1). Pad on the left so
    // column indices stay absolute for the positional fallback.
    let start_col = range.start().map(|(_, c)| c as usize).unwrap_or(0);
    debug!(start_col, size = ?range.get_size(), "worksheet range");

    let grid: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| {
            let mut cells = vec![CellValue::Empty; start_col];
            cells.extend(row.iter().map(convert_cell));
            cells
        })
        .collect();
    table_from_grid(grid)
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
            Some(d) => CellValue::Date(d),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => match parse_date_permissive(s) {
            Some(d) => CellValue::Date(d),
            None => CellValue::Text(s.clone()),
        },
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
    }
}

fn read_csv(bytes: &[u8]) -> Result<RawTable, ReportError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ReportError::Structural(format!("CSV is not valid UTF-8: {}", e)))?;
    let delimiter = sniff_delimiter(text);
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| ReportError::Structural(e.to_string()))?;
        grid.push(
            record
                .iter()
                .map(|f| {
                    if f.trim().is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(f.to_string())
                    }
                })
                .collect(),
        );
    }
    table_from_grid(grid)
}

/// Pick the delimiter that splits the first line into the most fields.
fn sniff_delimiter(content: &str) -> u8 {
    let first = content.lines().next().unwrap_or("");
    let mut best = b',';
    let mut best_count = 1usize;
    for &delim in &[b',', b';', b'\t', b'|'] {
        let count = ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(first.as_bytes())
            .records()
            .next()
            .and_then(|r| r.ok())
            .map(|r| r.len())
            .unwrap_or(1);
        if count > best_count {
            best = delim;
            best_count = count;
        }
    }
    best
}

/// First row is the header row; fully blank body rows are dropped.
fn table_from_grid(grid: Vec<Vec<CellValue>>) -> Result<RawTable, ReportError> {
    let mut iter = grid.into_iter();
    let header_row = iter
        .next()
        .ok_or_else(|| ReportError::Structural("no header row found".to_string()))?;
    if header_row.iter().all(CellValue::is_blank) {
        return Err(ReportError::Structural("header row is empty".to_string()));
    }
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let text = match c {
                CellValue::Text(s) => s.clone(),
                other => other.as_text(),
            };
            if text.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                text
            }
        })
        .collect();
    let rows = iter
        .filter(|r| !r.iter().all(CellValue::is_blank))
        .collect();
    Ok(RawTable::new(headers, rows))
}
