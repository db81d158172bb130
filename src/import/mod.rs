pub mod workbook;

use std::path::Path;

use anyhow::Result;
use rayon::prelude::*;

use crate::config::Config;
use crate::db::Database;
use crate::normalize::cell::CellValue;
use crate::normalize::{MemberRecord, RowNormalizer};
use workbook::{read_rows, SourceFormat};

pub struct ImportOptions<'a> {
    pub format: SourceFormat,
    /// Overrides the configured sheet
    pub sheet: Option<&'a str>,
    /// Normalize and report without touching the store
    pub dry_run: bool,
}

/// Result of an import run
pub struct ImportResult {
    pub sheet: String,
    pub records: Vec<MemberRecord>,
    pub imported: usize,
    pub skipped: usize,
}

/// Normalize rows in parallel, keeping input order. Rows without any name
/// are counted as skipped; rows with no content at all are dropped silently.
pub fn normalize_rows(
    normalizer: &RowNormalizer,
    rows: &[Vec<CellValue>],
) -> (Vec<MemberRecord>, usize) {
    let normalized: Vec<Option<MemberRecord>> = rows
        .par_iter()
        .map(|row| normalizer.normalize(row))
        .collect();

    let mut records = Vec::with_capacity(normalized.len());
    let mut skipped = 0usize;
    for (index, (record, row)) in normalized.into_iter().zip(rows).enumerate() {
        match record {
            Some(record) => records.push(record),
            None if row.iter().all(CellValue::is_empty) => {}
            None => {
                log::debug!("skipping data row #{}: no first or last name", index + 1);
                skipped += 1;
            }
        }
    }
    (records, skipped)
}

/// Full-replace import of a roster export into `db`.
pub fn import_roster(
    input: &Path,
    options: &ImportOptions<'_>,
    config: &Config,
    db: Option<&mut Database>,
) -> Result<ImportResult> {
    let sheet = options.sheet.or(config.import.sheet.as_deref());
    let source = read_rows(input, options.format, sheet, config.import.header_rows)?;
    let normalizer = config.row_normalizer()?;

    let width = config.import.columns.width();
    if !source.rows.is_empty() && source.rows.iter().all(|r| r.len() < width) {
        log::warn!(
            "no row in '{}' reaches column {}; missing cells are treated as empty",
            source.sheet,
            width
        );
    }

    let (records, skipped) = normalize_rows(&normalizer, &source.rows);
    log::info!(
        "normalized {} rows from '{}' ({} skipped without a name)",
        records.len(),
        source.sheet,
        skipped
    );

    let imported = match db {
        Some(db) if !options.dry_run => db.replace_members(&records)?,
        _ => 0,
    };

    Ok(ImportResult {
        sheet: source.sheet,
        records,
        imported,
        skipped,
    })
}
