use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::CoercionError;
use crate::types::{CellKind, CellValue, Record};

/// Apply a raw string edit to one cell of a record.
///
/// The column's semantic kind is whatever the existing value holds; the
/// input is coerced into that same kind, so an edit never changes a
/// column's type for that row. On failure the cell is left untouched.
pub fn edit(record: &mut Record, column: &str, raw: &str) -> Result<(), CoercionError> {
    let kind = record
        .get(column)
        .map(CellValue::kind)
        .ok_or_else(|| CoercionError::UnknownColumn(column.to_string()))?;

    let coerced = coerce(kind, column, raw)?;
    record.set(column, coerced);
    Ok(())
}

/// Coerce raw input into a cell value of the given kind.
///
/// The checks are an exhaustive match on the kind, one deterministic rule
/// per variant. Text accepts anything verbatim and never fails.
pub fn coerce(kind: CellKind, column: &str, raw: &str) -> Result<CellValue, CoercionError> {
    match kind {
        CellKind::Text => Ok(CellValue::Text(raw.to_string())),

        CellKind::Number => raw
            .trim()
            .parse::<f64>()
            .map(CellValue::Number)
            .map_err(|_| CoercionError::Number {
                column: column.to_string(),
                input: raw.to_string(),
            }),

        CellKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(CellValue::Bool(true)),
            "false" => Ok(CellValue::Bool(false)),
            _ => Err(CoercionError::Bool {
                column: column.to_string(),
                input: raw.to_string(),
            }),
        },

        CellKind::DateTime => parse_iso_8601(raw.trim())
            .map(CellValue::DateTime)
            .ok_or_else(|| CoercionError::DateTime {
                column: column.to_string(),
                input: raw.to_string(),
            }),
    }
}

/// Parse an ISO-8601 datetime or date. Date-only input lands on midnight.
pub(crate) fn parse_iso_8601(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}
