use thiserror::Error;

/// A byte stream could not be decoded into a table.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unrecognized or unreadable workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("workbook contains no sheets")]
    EmptyWorkbook,

    #[error("sheet '{0}' has no rows, headers cannot be derived")]
    EmptySheet(String),
}

/// An edit's raw input is incompatible with the column's established kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("column '{column}' expects a number, got '{input}'")]
    Number { column: String, input: String },

    #[error("column '{column}' expects true or false, got '{input}'")]
    Bool { column: String, input: String },

    #[error("column '{column}' expects an ISO-8601 date, got '{input}'")]
    DateTime { column: String, input: String },

    #[error("no column named '{0}'")]
    UnknownColumn(String),
}

/// A table could not be serialized to an output byte stream.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("table has no rows to export")]
    EmptyTable,

    #[error("failed to write workbook: {0}")]
    Write(String),
}

/// Errors surfaced by session-level operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no table is loaded")]
    NoTable,

    #[error("a load is in flight, the table cannot be touched")]
    LoadInFlight,

    #[error("row {0} is out of range")]
    RowOutOfRange(usize),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}
