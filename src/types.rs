use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Information about a sheet in a workbook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetInfo {
    pub name: String,
    pub index: u32,
    pub row_count: u32,
    pub col_count: u32,
}

/// The typed content of one table cell.
///
/// The domain is closed over these four kinds; richer spreadsheet content
/// (formulas, merged cells, rich text) degrades to text on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// The kind discriminant used by coercion and reporting.
    pub fn kind(&self) -> CellKind {
        match self {
            CellValue::Text(_) => CellKind::Text,
            CellValue::Number(_) => CellKind::Number,
            CellValue::Bool(_) => CellKind::Bool,
            CellValue::DateTime(_) => CellKind::DateTime,
        }
    }

    /// Display form of the value, as a cell would render it.
    pub fn to_display_string(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::DateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }

    /// Numeric view of the value, if it has one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// True for the empty text cell, the decoded form of a blank cell.
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.trim().is_empty())
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Text(String::new())
    }
}

/// The four semantic cell kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    Text,
    Number,
    Bool,
    DateTime,
}

impl std::fmt::Display for CellKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CellKind::Text => "text",
            CellKind::Number => "number",
            CellKind::Bool => "bool",
            CellKind::DateTime => "datetime",
        };
        write!(f, "{}", name)
    }
}

/// One row's data: an ordered mapping from column name to cell value.
///
/// Field order mirrors the owning table's header order, and the key set
/// equals the table's headers. `Table::new` normalizes both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new(fields: Vec<(String, CellValue)>) -> Self {
        Record { fields }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Replace the value under `column` in place. Returns false (and leaves
    /// the record untouched) when the column is unknown.
    pub fn set(&mut self, column: &str, value: CellValue) -> bool {
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// In-memory table: ordered headers plus one record per data row.
///
/// Created once per load, mutated in place by edits, replaced wholesale by
/// the next load. Export reads it without mutating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    /// Build a table, normalizing every record to the header order. Missing
    /// columns are filled with blank text cells; unknown columns are dropped.
    pub fn new(headers: Vec<String>, rows: Vec<Record>) -> Self {
        let rows = rows
            .into_iter()
            .map(|record| {
                let fields = headers
                    .iter()
                    .map(|header| {
                        let value = record.get(header).cloned().unwrap_or_default();
                        (header.clone(), value)
                    })
                    .collect();
                Record::new(fields)
            })
            .collect();
        Table { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Restartable iterator over the records.
    pub fn rows(&self) -> std::slice::Iter<'_, Record> {
        self.rows.iter()
    }

    pub fn row(&self, index: usize) -> Option<&Record> {
        self.rows.get(index)
    }

    pub fn row_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.rows.get_mut(index)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        self.rows.get(row).and_then(|record| record.get(column))
    }

    /// In-place cell write. Returns false when the row or column is unknown.
    pub fn set(&mut self, row: usize, column: &str, value: CellValue) -> bool {
        match self.rows.get_mut(row) {
            Some(record) => record.set(column, value),
            None => false,
        }
    }
}

/// Pipeline states for a session, per the load/edit/export state machine.
/// Both failed states are recoverable by retrying the originating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Unloaded,
    Loading,
    Loaded,
    Exporting,
    Exported,
    LoadFailed,
    ExportFailed,
}

/// Handle for one in-flight load. Only the ticket from the most recent
/// `begin_load` can still apply its result; older tickets are stale.
#[derive(Debug)]
pub struct LoadTicket {
    pub(crate) generation: u64,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Notification emitted by a session after it mutates its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TableEvent {
    Loaded { generation: u64, rows: usize },
    LoadFailed { generation: u64, message: String },
    StaleLoadDiscarded { generation: u64 },
    CellEdited { row: usize, column: String },
    Exported { bytes: usize },
    ExportFailed { message: String },
}
