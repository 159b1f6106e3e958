// Excel import (calamine) and export (rust_xlsxwriter)

use std::collections::BTreeSet;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use rust_xlsxwriter::{Color, Format, Workbook};

use batcvd_recon::model::{format_number, Cell, Table};

use crate::error::IoError;

/// How spreadsheet values are turned into cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMode {
    /// Everything becomes text: numbers without a trailing `.0`, dates as
    /// `YYYY-MM-DD` (plus ` HH:MM:SS` when a time part exists).
    Text,
    /// Numbers stay numeric; dates, booleans and errors become text.
    Typed,
}

/// One output sheet. `highlight` fills the listed data rows (0-based,
/// header excluded) with the given RGB color.
pub struct SheetOut<'a> {
    pub name: &'a str,
    pub table: &'a Table,
    pub highlight: Option<(&'a BTreeSet<usize>, u32)>,
}

impl<'a> SheetOut<'a> {
    pub fn plain(name: &'a str, table: &'a Table) -> Self {
        Self { name, table, highlight: None }
    }
}

// ============================================================================
// Import
// ============================================================================

fn open(path: &Path) -> Result<Sheets<std::io::BufReader<std::fs::File>>, IoError> {
    open_workbook_auto(path).map_err(|e| IoError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Read one sheet. `None` picks the first sheet in the workbook.
pub fn read_sheet(path: &Path, sheet: Option<&str>, mode: CellMode) -> Result<Table, IoError> {
    let mut workbook = open(path)?;
    let name = match sheet {
        Some(name) => name.to_string(),
        None => workbook.sheet_names().first().cloned().ok_or_else(|| IoError::Read {
            path: path.display().to_string(),
            message: "workbook contains no sheets".to_string(),
        })?,
    };
    read_from(&mut workbook, path, &name, mode)
}

/// Read several named sheets from one workbook, in the order given.
pub fn read_sheets(path: &Path, names: &[&str], mode: CellMode) -> Result<Vec<Table>, IoError> {
    let mut workbook = open(path)?;
    names
        .iter()
        .map(|name| read_from(&mut workbook, path, name, mode))
        .collect()
}

fn read_from(
    workbook: &mut Sheets<std::io::BufReader<std::fs::File>>,
    path: &Path,
    name: &str,
    mode: CellMode,
) -> Result<Table, IoError> {
    if !workbook.sheet_names().iter().any(|s| s.as_str() == name) {
        return Err(IoError::MissingSheet {
            path: path.display().to_string(),
            sheet: name.to_string(),
        });
    }
    let range = workbook.worksheet_range(name).map_err(|e| IoError::Read {
        path: path.display().to_string(),
        message: format!("sheet '{}': {}", name, e),
    })?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header) => header.iter().map(|d| convert(d, CellMode::Text).to_string()).collect(),
        None => {
            return Err(IoError::EmptySheet {
                path: path.display().to_string(),
                sheet: name.to_string(),
            })
        }
    };

    let table = Table::from_rows(
        headers,
        rows.map(|row| row.iter().map(|d| convert(d, mode)).collect::<Vec<_>>()),
    );
    tracing::debug!(sheet = name, rows = table.len(), columns = table.columns().len(), "sheet read");
    Ok(table)
}

fn convert(data: &Data, mode: CellMode) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::text(s.as_str()),
        Data::Float(n) => match mode {
            CellMode::Typed => Cell::Number(*n),
            CellMode::Text => Cell::text(format_number(*n)),
        },
        Data::Int(n) => match mode {
            CellMode::Typed => Cell::Number(*n as f64),
            CellMode::Text => Cell::text(n.to_string()),
        },
        Data::Bool(b) => Cell::text(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => Cell::text(format!("#{:?}", e)),
        Data::DateTime(dt) => Cell::text(serial_to_text(dt.as_f64())),
        Data::DateTimeIso(s) => Cell::text(s.as_str()),
        Data::DurationIso(s) => Cell::text(s.as_str()),
    }
}

/// Excel 1900-system serial to `YYYY-MM-DD[ HH:MM:SS]`.
fn serial_to_text(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return format_number(serial);
    };
    let days = serial.floor();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    let date = epoch + Duration::days(days as i64);
    if seconds == 0 {
        return date.format("%Y-%m-%d").to_string();
    }
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => (midnight + Duration::seconds(seconds))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => date.format("%Y-%m-%d").to_string(),
    }
}

// ============================================================================
// Export
// ============================================================================

/// Write the sheets to a new xlsx file, replacing any existing one.
pub fn write_workbook(path: &Path, sheets: &[SheetOut<'_>]) -> Result<(), IoError> {
    let err = |e: rust_xlsxwriter::XlsxError| IoError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    };

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name).map_err(err)?;

        for (col, name) in sheet.table.columns().iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, name, &header_format)
                .map_err(err)?;
        }

        let fill = sheet
            .highlight
            .map(|(rows, rgb)| (rows, Format::new().set_background_color(Color::RGB(rgb))));

        for (row_idx, row) in sheet.table.rows().iter().enumerate() {
            let row32 = row_idx as u32 + 1;
            let format = fill
                .as_ref()
                .filter(|(rows, _)| rows.contains(&row_idx))
                .map(|(_, format)| format);

            for (col, cell) in row.iter().enumerate() {
                let col16 = col as u16;
                match (cell, format) {
                    (Cell::Empty, Some(format)) => {
                        worksheet.write_blank(row32, col16, format).map_err(err)?;
                    }
                    (Cell::Empty, None) => {}
                    (Cell::Text(s), Some(format)) => {
                        worksheet.write_string_with_format(row32, col16, s, format).map_err(err)?;
                    }
                    (Cell::Text(s), None) => {
                        worksheet.write_string(row32, col16, s).map_err(err)?;
                    }
                    (Cell::Number(n), Some(format)) => {
                        worksheet.write_number_with_format(row32, col16, *n, format).map_err(err)?;
                    }
                    (Cell::Number(n), None) => {
                        worksheet.write_number(row32, col16, *n).map_err(err)?;
                    }
                }
            }
        }

        worksheet.autofit();
    }

    workbook.save(path).map_err(err)?;
    tracing::debug!(path = %path.display(), sheets = sheets.len(), "workbook written");
    Ok(())
}
