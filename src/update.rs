//! Validation of user-supplied member edits.
//!
//! Input arrives as a JSON object (or `column=value` pairs from the command
//! line) and is checked against the editable column set before anything
//! reaches the store.

use std::collections::BTreeMap;

use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::level::{MembershipLevel, UnknownLevel};

/// Columns a user may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EditableColumn {
    FirstName,
    LastName,
    Phone,
    Email,
    BoardContact,
    MembershipLevel,
    AttendanceNotes,
    OutreachNotes,
    TicketsFeb,
    TicketsApr,
    Active,
}

impl EditableColumn {
    pub const ALL: [EditableColumn; 11] = [
        EditableColumn::FirstName,
        EditableColumn::LastName,
        EditableColumn::Phone,
        EditableColumn::Email,
        EditableColumn::BoardContact,
        EditableColumn::MembershipLevel,
        EditableColumn::AttendanceNotes,
        EditableColumn::OutreachNotes,
        EditableColumn::TicketsFeb,
        EditableColumn::TicketsApr,
        EditableColumn::Active,
    ];

    /// Store column name
    pub fn as_str(&self) -> &'static str {
        match self {
            EditableColumn::FirstName => "firstname",
            EditableColumn::LastName => "lastname",
            EditableColumn::Phone => "phone",
            EditableColumn::Email => "email",
            EditableColumn::BoardContact => "board_contact",
            EditableColumn::MembershipLevel => "membership_level",
            EditableColumn::AttendanceNotes => "attendance_notes",
            EditableColumn::OutreachNotes => "outreach_notes",
            EditableColumn::TicketsFeb => "tickets_feb_2026",
            EditableColumn::TicketsApr => "tickets_apr",
            EditableColumn::Active => "active",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UpdateError {
    #[error("No data provided")]
    NoData,
    #[error("No valid fields provided")]
    NoValidFields,
    #[error("Invalid integer for {0}")]
    InvalidInteger(&'static str),
    #[error("Invalid boolean for active")]
    InvalidBoolean,
    #[error("Invalid text for {0}")]
    InvalidText(&'static str),
    #[error(transparent)]
    UnknownLevel(#[from] UnknownLevel),
    #[error("invalid assignment '{0}', expected column=value")]
    InvalidAssignment(String),
}

/// A validated value ready to bind into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl From<FieldValue> for SqlValue {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Null => SqlValue::Null,
            FieldValue::Text(s) => SqlValue::Text(s),
            FieldValue::Integer(i) => SqlValue::Integer(i),
            FieldValue::Bool(b) => SqlValue::Integer(i64::from(b)),
        }
    }
}

/// Set of column assignments that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberPatch {
    fields: BTreeMap<EditableColumn, FieldValue>,
}

impl MemberPatch {
    pub fn from_json(value: &Value) -> Result<Self, UpdateError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Err(UpdateError::NoData),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, UpdateError> {
        if map.is_empty() {
            return Err(UpdateError::NoData);
        }

        let mut fields = BTreeMap::new();
        for (key, raw) in map {
            let Some(column) = EditableColumn::from_name(key) else {
                log::warn!("ignoring non-editable field `{}`", key);
                continue;
            };
            fields.insert(column, coerce(column, raw)?);
        }

        if fields.is_empty() {
            return Err(UpdateError::NoValidFields);
        }
        Ok(Self { fields })
    }

    #[cfg(test)]
    pub fn get(&self, column: EditableColumn) -> Option<&FieldValue> {
        self.fields.get(&column)
    }

    /// Column/value pairs in column order, converted for binding.
    pub fn assignments(&self) -> Vec<(EditableColumn, SqlValue)> {
        self.fields
            .iter()
            .map(|(column, value)| (*column, SqlValue::from(value.clone())))
            .collect()
    }
}

/// Split a `column=value` command-line assignment.
pub fn parse_assignment(raw: &str) -> Result<(String, Value), UpdateError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| UpdateError::InvalidAssignment(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(UpdateError::InvalidAssignment(raw.to_string()));
    }
    Ok((key.to_string(), Value::String(value.to_string())))
}

fn coerce(column: EditableColumn, raw: &Value) -> Result<FieldValue, UpdateError> {
    match column {
        EditableColumn::TicketsFeb | EditableColumn::TicketsApr => coerce_ticket(column, raw),
        EditableColumn::Active => coerce_active(raw).map(FieldValue::Bool),
        EditableColumn::MembershipLevel => coerce_level(raw),
        _ => coerce_text(column, raw),
    }
}

fn coerce_ticket(column: EditableColumn, raw: &Value) -> Result<FieldValue, UpdateError> {
    let invalid = || UpdateError::InvalidInteger(column.as_str());
    let count = match raw {
        Value::Null => return Ok(FieldValue::Null),
        Value::String(s) if s.is_empty() => return Ok(FieldValue::Null),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => n.as_f64().map(|f| f.trunc() as i64).ok_or_else(invalid)?,
        },
        Value::Bool(b) => i64::from(*b),
        Value::Array(_) | Value::Object(_) => return Err(invalid()),
    };
    if count < 0 {
        return Err(invalid());
    }
    Ok(FieldValue::Integer(count))
}

fn coerce_active(raw: &Value) -> Result<bool, UpdateError> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::String(s) => Ok(matches!(s.to_lowercase().as_str(), "true" | "1" | "yes")),
        Value::Number(n) => Ok(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(UpdateError::InvalidBoolean),
    }
}

fn coerce_level(raw: &Value) -> Result<FieldValue, UpdateError> {
    match raw {
        Value::Null => Ok(FieldValue::Null),
        Value::String(s) if s.trim().is_empty() => Ok(FieldValue::Null),
        Value::String(s) => {
            let level: MembershipLevel = s.parse()?;
            Ok(FieldValue::Text(level.as_str().to_string()))
        }
        other => Err(UnknownLevel(other.to_string()).into()),
    }
}

fn coerce_text(column: EditableColumn, raw: &Value) -> Result<FieldValue, UpdateError> {
    match raw {
        Value::Null => Ok(FieldValue::Null),
        Value::String(s) => Ok(FieldValue::Text(s.clone())),
        Value::Number(n) => Ok(FieldValue::Text(n.to_string())),
        Value::Bool(b) => Ok(FieldValue::Text(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(UpdateError::InvalidText(column.as_str())),
    }
}
