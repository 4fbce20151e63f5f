use std::io::{Cursor, Seek, Write};
use tracing::debug;
use umya_spreadsheet::{new_file, writer, Spreadsheet};

use crate::error::EncodeError;
use crate::types::{CellValue, Table};

const SHEET_NAME: &str = "Sheet1";

/// Serialize a table to xlsx bytes.
///
/// The header row comes first, in header order, then one row per record.
/// Fails with [`EncodeError::EmptyTable`] when there are no records,
/// mirroring the loader's empty-sheet failure. The table is never mutated.
pub fn export(table: &Table) -> Result<Vec<u8>, EncodeError> {
    let mut cursor = Cursor::new(Vec::new());
    export_to_writer(table, &mut cursor)?;
    Ok(cursor.into_inner())
}

/// Serialize a table into any seekable writer.
pub fn export_to_writer<W: Write + Seek>(table: &Table, mut writer: W) -> Result<(), EncodeError> {
    let book = build_workbook(table)?;

    writer::xlsx::write_writer(&book, &mut writer)
        .map_err(|e| EncodeError::Write(e.to_string()))?;

    debug!(
        rows = table.row_count(),
        columns = table.headers().len(),
        "encoded table"
    );

    Ok(())
}

/// Build the in-memory workbook for a table.
fn build_workbook(table: &Table) -> Result<Spreadsheet, EncodeError> {
    if table.row_count() == 0 {
        return Err(EncodeError::EmptyTable);
    }

    let mut book = new_file();

    if book.get_sheet_by_name(SHEET_NAME).is_none() {
        let _ = book.new_sheet(SHEET_NAME);
    }
    let sheet = book
        .get_sheet_by_name_mut(SHEET_NAME)
        .ok_or_else(|| EncodeError::Write("default sheet missing".to_string()))?;

    for (col_idx, header) in table.headers().iter().enumerate() {
        let col_num = (col_idx + 1) as u32;
        sheet.get_cell_mut((col_num, 1)).set_value_string(header);
    }

    // Kind-preserving setters: numbers and booleans keep their cell type,
    // datetimes go out as ISO-8601 text that the loader sniffs back.
    for (row_idx, record) in table.rows().enumerate() {
        let row_num = (row_idx + 2) as u32;

        for (col_idx, header) in table.headers().iter().enumerate() {
            let col_num = (col_idx + 1) as u32;
            let cell = sheet.get_cell_mut((col_num, row_num));

            match record.get(header) {
                None => {}
                Some(CellValue::Text(s)) => {
                    cell.set_value_string(s);
                }
                Some(CellValue::Number(n)) => {
                    cell.set_value_number(*n);
                }
                Some(CellValue::Bool(b)) => {
                    cell.set_value_bool(*b);
                }
                Some(CellValue::DateTime(dt)) => {
                    cell.set_value_string(dt.format("%Y-%m-%dT%H:%M:%S").to_string());
                }
            }
        }
    }

    Ok(book)
}
