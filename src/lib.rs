//! Tabular load/edit/export pipeline.
//!
//! This crate provides:
//! - Decoding workbook byte streams (xlsx, xls, ods) into an in-memory table
//! - Kind-preserving single-cell edits with checked coercion
//! - Encoding the table back to xlsx bytes
//! - A session driving the pipeline state machine with a last-load-wins
//!   guard and explicit observer notification
//! - Read-only filter/search operations over a table

pub mod editor;
pub mod error;
pub mod exporter;
pub mod loader;
pub mod query;
pub mod session;
pub mod types;

// Re-export commonly used types and functions
pub use editor::{coerce, edit};
pub use error::{CoercionError, DecodeError, EncodeError, SessionError};
pub use exporter::{export, export_to_writer};
pub use loader::{fingerprint, list_sheets, load, load_bytes};
pub use query::{filter, search, FilterOp};
pub use session::{LoadOutcome, Session};
pub use types::{
    CellKind, CellValue, LoadTicket, Record, SessionState, SheetInfo, Table, TableEvent,
};
