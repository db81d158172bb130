//! Reading raw rows out of a spreadsheet export.
//!
//! Spreadsheets (xlsx, xls, ods) go through calamine; CSV exports through
//! the csv crate. Both produce rows of [`CellValue`] addressed from column A,
//! so column mappings mean the same thing regardless of the source format.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};

use crate::normalize::cell::CellValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Workbook,
    Csv,
}

impl SourceFormat {
    /// Guess the format from the file extension; anything that is not
    /// `.csv` is handed to calamine.
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => SourceFormat::Csv,
            _ => SourceFormat::Workbook,
        }
    }
}

/// Data rows of one sheet, with header rows already dropped.
#[derive(Debug, Clone)]
pub struct SheetRows {
    pub sheet: String,
    pub rows: Vec<Vec<CellValue>>,
}

pub fn read_rows(
    path: &Path,
    format: SourceFormat,
    sheet: Option<&str>,
    header_rows: usize,
) -> Result<SheetRows> {
    match format {
        SourceFormat::Workbook => read_workbook(path, sheet, header_rows),
        SourceFormat::Csv => read_csv(path, header_rows),
    }
}

fn read_workbook(path: &Path, sheet: Option<&str>, header_rows: usize) -> Result<SheetRows> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook at {}", path.display()))?;

    let names = workbook.sheet_names();
    let sheet_name = match sheet {
        Some(name) => names
            .iter()
            .find(|n| n.as_str() == name)
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "sheet '{}' not found in {} (available: {})",
                    name,
                    path.display(),
                    names.join(", ")
                )
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("workbook {} has no sheets", path.display()))?,
    };
    log::info!("reading sheet '{}' from {}", sheet_name, path.display());

    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("failed to read sheet '{}'", sheet_name))?;

    // calamine ranges start at the first used cell, not at A1.
    let (first_row, first_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows = Vec::new();
    for (offset, cells) in range.rows().enumerate() {
        if first_row + offset < header_rows {
            continue;
        }
        let mut row = vec![CellValue::Empty; first_col];
        row.extend(cells.iter().map(cell_from_data));
        rows.push(row);
    }

    Ok(SheetRows {
        sheet: sheet_name,
        rows,
    })
}

fn cell_from_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

fn read_csv(path: &Path, header_rows: usize) -> Result<SheetRows> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open CSV export at {}", path.display()))?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("failed to read CSV record #{}", index + 1))?;
        if index < header_rows {
            continue;
        }
        rows.push(record.iter().map(CellValue::from).collect());
    }

    let sheet = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(SheetRows { sheet, rows })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_detect_format() {
        assert_eq!(SourceFormat::detect(Path::new("a/roster.CSV")), SourceFormat::Csv);
        assert_eq!(SourceFormat::detect(Path::new("SPARC.xlsx")), SourceFormat::Workbook);
        assert_eq!(SourceFormat::detect(Path::new("export")), SourceFormat::Workbook);
    }

    #[test]
    fn test_read_csv_skips_headers_and_keeps_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.csv");
        fs::write(
            &path,
            "First,Last,Phone\nAda,Lovelace,555-0100\n,Hopper\n\"Smith, Jr\",,\n",
        )
        .unwrap();

        let sheet = read_rows(&path, SourceFormat::Csv, None, 1).unwrap();
        assert_eq!(sheet.sheet, "roster");
        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(
            sheet.rows[0],
            vec![
                CellValue::Text("Ada".into()),
                CellValue::Text("Lovelace".into()),
                CellValue::Text("555-0100".into()),
            ]
        );
        assert_eq!(
            sheet.rows[1],
            vec![CellValue::Empty, CellValue::Text("Hopper".into())]
        );
        assert_eq!(sheet.rows[2][0], CellValue::Text("Smith, Jr".into()));
    }

    #[test]
    fn test_read_missing_workbook_fails_with_path() {
        let err = read_rows(Path::new("/nonexistent/roster.xlsx"), SourceFormat::Workbook, None, 1)
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/roster.xlsx"));
    }

    #[test]
    fn test_cell_from_data() {
        assert_eq!(cell_from_data(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(cell_from_data(&Data::Float(2.0)), CellValue::Float(2.0));
        assert_eq!(cell_from_data(&Data::Int(7)), CellValue::Int(7));
    }
}
