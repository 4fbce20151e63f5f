use serde::{Deserialize, Serialize};

use crate::types::{CellValue, Table};

/// Comparison operator for [`filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    IsEmpty,
    NotEmpty,
}

/// Indices of the rows whose cell under `column` matches the condition.
///
/// Text comparisons are case-insensitive; ordering operators compare
/// numerically and never match when either side has no numeric view.
/// An unknown column yields no matches.
pub fn filter(table: &Table, column: &str, op: FilterOp, needle: &str) -> Vec<usize> {
    if !table.headers().iter().any(|h| h == column) {
        return Vec::new();
    }

    table
        .rows()
        .enumerate()
        .filter(|(_, record)| {
            let cell = match record.get(column) {
                Some(cell) => cell,
                None => return false,
            };
            let cell_str = cell.to_display_string();

            match op {
                FilterOp::Equals => cell_str.eq_ignore_ascii_case(needle),
                FilterOp::NotEquals => !cell_str.eq_ignore_ascii_case(needle),
                FilterOp::Contains => {
                    cell_str.to_lowercase().contains(&needle.to_lowercase())
                }
                FilterOp::NotContains => {
                    !cell_str.to_lowercase().contains(&needle.to_lowercase())
                }
                FilterOp::GreaterThan => compare_numeric(cell, needle, |a, b| a > b),
                FilterOp::LessThan => compare_numeric(cell, needle, |a, b| a < b),
                FilterOp::GreaterEqual => compare_numeric(cell, needle, |a, b| a >= b),
                FilterOp::LessEqual => compare_numeric(cell, needle, |a, b| a <= b),
                FilterOp::IsEmpty => cell.is_blank(),
                FilterOp::NotEmpty => !cell.is_blank(),
            }
        })
        .map(|(index, _)| index)
        .collect()
}

/// Indices of the rows containing `query` in any column, case-insensitive.
pub fn search(table: &Table, query: &str) -> Vec<usize> {
    let query_lower = query.to_lowercase();

    table
        .rows()
        .enumerate()
        .filter(|(_, record)| {
            record.iter().any(|(_, cell)| {
                cell.to_display_string()
                    .to_lowercase()
                    .contains(&query_lower)
            })
        })
        .map(|(index, _)| index)
        .collect()
}

fn compare_numeric(cell: &CellValue, needle: &str, cmp: fn(f64, f64) -> bool) -> bool {
    match (cell.as_number(), needle.trim().parse::<f64>()) {
        (Some(a), Ok(b)) => cmp(a, b),
        _ => false,
    }
}
