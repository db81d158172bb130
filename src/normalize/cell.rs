//! Coercion of individual spreadsheet cells.
//!
//! Every function here is total: a malformed cell degrades to `None`
//! instead of failing, so one bad value never aborts an import.

use serde::Serialize;

/// Typed value of a single spreadsheet cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Placeholders left behind by data-entry slips in ticket columns.
const TICKET_PLACEHOLDERS: [&str; 3] = ["`", "'`'", ""];

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Render the cell as text, untrimmed. Integral floats lose their
    /// fractional part (`3.0` renders as `3`).
    pub fn to_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Int(i) => Some(i.to_string()),
            CellValue::Float(f) => Some(match integral(*f) {
                Some(i) => i.to_string(),
                None => f.to_string(),
            }),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Trimmed text of a cell, `None` when absent or blank.
pub fn clean_text(cell: &CellValue) -> Option<String> {
    cell.to_text()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Phone numbers typed into a spreadsheet often arrive as floats
/// (`5103348246.0`); those are truncated and rendered as digits.
pub fn clean_phone(cell: &CellValue) -> Option<String> {
    match cell {
        CellValue::Empty => None,
        CellValue::Float(f) => {
            if !f.is_finite() || f.abs() >= i64::MAX as f64 {
                return None;
            }
            Some((f.trunc() as i64).to_string())
        }
        other => clean_text(other),
    }
}

/// Ticket counts: numbers are truncated, text is parsed as a float and
/// truncated, everything else (including negative counts) is unknown.
pub fn clean_tickets(cell: &CellValue) -> Option<u32> {
    match cell {
        CellValue::Empty => None,
        CellValue::Int(i) => u32::try_from(*i).ok(),
        CellValue::Float(f) => count_from_float(*f),
        CellValue::Bool(b) => Some(u32::from(*b)),
        CellValue::Text(s) => {
            let trimmed = s.trim();
            if TICKET_PLACEHOLDERS.contains(&trimmed) {
                return None;
            }
            trimmed.parse::<f64>().ok().and_then(count_from_float)
        }
    }
}

fn count_from_float(f: f64) -> Option<u32> {
    if !f.is_finite() {
        return None;
    }
    let truncated = f.trunc();
    if truncated < 0.0 || truncated > u32::MAX as f64 {
        return None;
    }
    Some(truncated as u32)
}
