pub mod attendance;
pub mod cell;

use serde::Serialize;

use crate::level::MembershipLevel;
use attendance::AttendanceParser;
use cell::{clean_phone, clean_text, clean_tickets, CellValue};

static EMPTY_CELL: CellValue = CellValue::Empty;

/// One member, normalized from a spreadsheet row and ready for the store.
/// Serializes under the store's column names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberRecord {
    #[serde(rename = "firstname")]
    pub first_name: Option<String>,
    #[serde(rename = "lastname")]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub board_contact: Option<String>,
    pub outreach_notes: Option<String>,
    pub membership_level: Option<MembershipLevel>,
    pub attendance_notes: Option<String>,
    #[serde(rename = "tickets_feb_2026")]
    pub tickets_feb: Option<u32>,
    pub tickets_apr: Option<u32>,
    pub active: bool,
}

/// Zero-based cell positions of each roster field within a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub first_name: usize,
    pub last_name: usize,
    pub phone: usize,
    pub board_contact: usize,
    pub outreach_notes: usize,
    pub attendance: usize,
    pub email: usize,
    pub tickets_feb: usize,
    pub tickets_apr: usize,
}

impl Default for ColumnMap {
    fn default() -> Self {
        // A..G, H and M of the roster workbook
        Self {
            first_name: 0,
            last_name: 1,
            phone: 2,
            board_contact: 3,
            outreach_notes: 4,
            attendance: 5,
            email: 6,
            tickets_feb: 7,
            tickets_apr: 12,
        }
    }
}

impl ColumnMap {
    /// Number of cells a row needs to cover every mapped column.
    pub fn width(&self) -> usize {
        let last = [
            self.first_name,
            self.last_name,
            self.phone,
            self.board_contact,
            self.outreach_notes,
            self.attendance,
            self.email,
            self.tickets_feb,
            self.tickets_apr,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        last + 1
    }
}

/// Stateless per-row normalizer; safe to share across threads.
#[derive(Debug, Clone)]
pub struct RowNormalizer {
    columns: ColumnMap,
    attendance: AttendanceParser,
}

impl RowNormalizer {
    pub fn new(columns: ColumnMap, attendance: AttendanceParser) -> Self {
        Self {
            columns,
            attendance,
        }
    }

    /// Normalize one row. Returns `None` when the row carries no name at
    /// all; every other missing field just becomes absent.
    pub fn normalize(&self, row: &[CellValue]) -> Option<MemberRecord> {
        let cell = |index: usize| row.get(index).unwrap_or(&EMPTY_CELL);

        let first_name = clean_text(cell(self.columns.first_name));
        let last_name = clean_text(cell(self.columns.last_name));
        if first_name.is_none() && last_name.is_none() {
            return None;
        }

        let raw_attendance = cell(self.columns.attendance).to_text();
        let attendance = self.attendance.parse(raw_attendance.as_deref());

        Some(MemberRecord {
            first_name,
            last_name,
            phone: clean_phone(cell(self.columns.phone)),
            email: clean_text(cell(self.columns.email)),
            board_contact: clean_text(cell(self.columns.board_contact)),
            outreach_notes: clean_text(cell(self.columns.outreach_notes)),
            membership_level: attendance.level,
            attendance_notes: attendance.notes,
            tickets_feb: clean_tickets(cell(self.columns.tickets_feb)),
            tickets_apr: clean_tickets(cell(self.columns.tickets_apr)),
            active: attendance.active,
        })
    }
}
