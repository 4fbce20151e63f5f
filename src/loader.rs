use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use tracing::debug;

use crate::editor::parse_iso_8601;
use crate::error::DecodeError;
use crate::types::{CellValue, Record, SheetInfo, Table};

/// Decode a workbook byte stream into a table.
///
/// The first sheet becomes the active table; its first row supplies the
/// headers and every following row becomes one record.
pub fn load<RS: Read + Seek + Clone>(source: RS) -> Result<Table, DecodeError> {
    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(source)?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first_sheet = sheet_names
        .first()
        .cloned()
        .ok_or(DecodeError::EmptyWorkbook)?;

    let range = workbook.worksheet_range(&first_sheet)?;
    let table = decode_range(&range, &first_sheet)?;

    debug!(
        sheet = %first_sheet,
        rows = table.row_count(),
        columns = table.headers().len(),
        "decoded table"
    );

    Ok(table)
}

/// Convenience wrapper over [`load`] for in-memory sources.
pub fn load_bytes(bytes: &[u8]) -> Result<Table, DecodeError> {
    load(Cursor::new(bytes))
}

/// Turn a sheet range into headers plus records.
fn decode_range(range: &Range<Data>, sheet_name: &str) -> Result<Table, DecodeError> {
    let (row_count, col_count) = range.get_size();
    if row_count == 0 || col_count == 0 {
        return Err(DecodeError::EmptySheet(sheet_name.to_string()));
    }

    // Headers from the first row, in column order. Blank header cells fall
    // back to the column letter; duplicates get a numeric suffix so record
    // keys stay unique.
    let mut headers: Vec<String> = (0..col_count)
        .map(|col_idx| match range.get((0, col_idx)) {
            Some(Data::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Data::Float(f)) => f.to_string(),
            Some(Data::Int(i)) => i.to_string(),
            Some(Data::Bool(b)) => b.to_string(),
            _ => column_index_to_letter(col_idx as u32),
        })
        .collect();
    dedupe_headers(&mut headers);

    let mut rows = Vec::with_capacity(row_count - 1);
    for row_idx in 1..row_count {
        let fields = (0..col_count)
            .map(|col_idx| {
                let value = convert_cell(range.get((row_idx, col_idx)));
                (headers[col_idx].clone(), value)
            })
            .collect();
        rows.push(Record::new(fields));
    }

    Ok(Table::new(headers, rows))
}

/// Convert a calamine cell to a [`CellValue`].
fn convert_cell(cell: Option<&Data>) -> CellValue {
    match cell {
        None => CellValue::Text(String::new()),
        Some(data) => match data {
            Data::Empty => CellValue::Text(String::new()),
            Data::String(s) => sniff_text(s),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateTime(excel_serial_to_datetime(dt.as_f64())),
            Data::DateTimeIso(s) => match parse_iso_8601(s) {
                Some(dt) => CellValue::DateTime(dt),
                None => CellValue::Text(s.clone()),
            },
            Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(e) => CellValue::Text(format!("{:?}", e)),
        },
    }
}

/// Text cells holding an ISO-8601 date become DateTime. xlsx has no
/// distinct date type for string-written values, so this is what keeps
/// dates stable across an export/load round trip.
fn sniff_text(s: &str) -> CellValue {
    match parse_iso_8601(s) {
        Some(dt) => CellValue::DateTime(dt),
        None => CellValue::Text(s.to_string()),
    }
}

/// Convert an Excel serial datetime (days since 1899-12-30) to a calendar
/// datetime.
fn excel_serial_to_datetime(value: f64) -> NaiveDateTime {
    let days = value.floor() as i64;
    let time_fraction = value.fract();

    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN);
    let mut date = epoch + chrono::Duration::days(days);

    // A fraction can round up to a full day; carry it instead of wrapping.
    let mut total_seconds = (time_fraction * 86400.0).round() as u32;
    if total_seconds >= 86400 {
        date += chrono::Duration::days(1);
        total_seconds = 0;
    }

    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let time = NaiveTime::from_hms_opt(hours, minutes, seconds).unwrap_or_default();
    NaiveDateTime::new(date, time)
}

/// Make header names unique by appending a numeric suffix to repeats.
fn dedupe_headers(headers: &mut [String]) {
    let mut seen: HashMap<String, u32> = HashMap::new();
    for header in headers.iter_mut() {
        let count = {
            let entry = seen.entry(header.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        if count > 1 {
            let base = header.clone();
            let mut suffix = count;
            loop {
                let candidate = format!("{}_{}", base, suffix);
                if !seen.contains_key(&candidate) {
                    seen.insert(candidate.clone(), 1);
                    *header = candidate;
                    break;
                }
                suffix += 1;
            }
        }
    }
}

/// Convert column index (0-based) to Excel column letter (A, B, ..., Z, AA, AB, ...)
fn column_index_to_letter(index: u32) -> String {
    let mut result = String::new();
    let mut n = index + 1;

    while n > 0 {
        n -= 1;
        let c = (b'A' + (n % 26) as u8) as char;
        result.insert(0, c);
        n /= 26;
    }

    result
}

/// List the sheets a workbook byte stream contains, with their sizes.
pub fn list_sheets<RS: Read + Seek + Clone>(source: RS) -> Result<Vec<SheetInfo>, DecodeError> {
    let mut workbook: Sheets<_> = open_workbook_auto_from_rs(source)?;

    let sheet_names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::new();

    for (index, name) in sheet_names.iter().enumerate() {
        if let Ok(range) = workbook.worksheet_range(name) {
            let (rows, cols) = range.get_size();
            sheets.push(SheetInfo {
                name: name.clone(),
                index: index as u32,
                row_count: rows as u32,
                col_count: cols as u32,
            });
        }
    }

    Ok(sheets)
}

/// SHA-256 hex digest of a source byte stream. Sessions record it per load
/// so callers can tell whether a re-fetched source actually changed.
pub fn fingerprint(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_index_to_letter() {
        assert_eq!(column_index_to_letter(0), "A");
        assert_eq!(column_index_to_letter(1), "B");
        assert_eq!(column_index_to_letter(25), "Z");
        assert_eq!(column_index_to_letter(26), "AA");
        assert_eq!(column_index_to_letter(27), "AB");
        assert_eq!(column_index_to_letter(51), "AZ");
        assert_eq!(column_index_to_letter(52), "BA");
    }

    #[test]
    fn dedupe_appends_suffixes() {
        let mut headers = vec![
            "Name".to_string(),
            "Name".to_string(),
            "Name".to_string(),
            "Other".to_string(),
        ];
        dedupe_headers(&mut headers);
        assert_eq!(headers, vec!["Name", "Name_2", "Name_3", "Other"]);
    }

    #[test]
    fn dedupe_avoids_existing_names() {
        let mut headers = vec!["A".to_string(), "A_2".to_string(), "A".to_string()];
        dedupe_headers(&mut headers);
        assert_eq!(headers[0], "A");
        assert_eq!(headers[1], "A_2");
        assert_ne!(headers[2], "A");
        assert_ne!(headers[2], "A_2");
    }

    #[test]
    fn excel_serial_conversion() {
        let dt = excel_serial_to_datetime(1.0);
        assert_eq!(dt.to_string(), "1899-12-31 00:00:00");

        let dt = excel_serial_to_datetime(2.5);
        assert_eq!(dt.to_string(), "1900-01-01 12:00:00");
    }

    #[test]
    fn excel_serial_carries_rounded_up_fractions() {
        // 0.999999999 of a day rounds to 86400 seconds; that is the next
        // midnight, not 24:00 of the same day.
        let dt = excel_serial_to_datetime(2.999999999);
        assert_eq!(dt.to_string(), "1900-01-02 00:00:00");
    }

    #[test]
    fn sniff_recognizes_iso_dates() {
        assert!(matches!(sniff_text("2024-05-01"), CellValue::DateTime(_)));
        assert!(matches!(
            sniff_text("2024-05-01T10:30:00"),
            CellValue::DateTime(_)
        ));
        assert!(matches!(sniff_text("hello"), CellValue::Text(_)));
        assert!(matches!(sniff_text("2024-05-01x"), CellValue::Text(_)));
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(
            fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
    }

    #[test]
    fn load_accepts_owned_and_borrowed_cursors() {
        // Format sniffing clones the reader, so both cursor flavors must
        // satisfy the bounds.
        assert!(load(Cursor::new(b"not a workbook".to_vec())).is_err());
        assert!(load(Cursor::new(&b"not a workbook"[..])).is_err());
    }

    #[test]
    fn load_rejects_unrecognized_bytes() {
        assert!(matches!(
            load_bytes(b"this is not a workbook"),
            Err(DecodeError::Workbook(_))
        ));
        assert!(load_bytes(b"").is_err());
    }

    #[test]
    fn header_only_range_yields_zero_records() {
        let mut range: Range<Data> = Range::new((0, 0), (0, 1));
        range.set_value((0, 0), Data::String("Name".to_string()));
        range.set_value((0, 1), Data::String("Index".to_string()));

        let table = decode_range(&range, "Sheet1").unwrap();
        assert_eq!(table.headers(), &["Name".to_string(), "Index".to_string()]);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn empty_range_is_a_decode_error() {
        let range: Range<Data> = Range::empty();
        assert!(matches!(
            decode_range(&range, "Sheet1"),
            Err(DecodeError::EmptySheet(_))
        ));
    }

    #[test]
    fn decode_range_builds_records_with_header_fallbacks() {
        let mut range: Range<Data> = Range::new((0, 0), (1, 2));
        range.set_value((0, 0), Data::String("Name".to_string()));
        // Second header left blank, third is a number.
        range.set_value((0, 2), Data::Int(7));
        range.set_value((1, 0), Data::String("Bill Clinton".to_string()));
        range.set_value((1, 1), Data::Float(42.0));
        range.set_value((1, 2), Data::Bool(true));

        let table = decode_range(&range, "Sheet1").unwrap();
        assert_eq!(
            table.headers(),
            &["Name".to_string(), "B".to_string(), "7".to_string()]
        );
        assert_eq!(table.row_count(), 1);
        assert_eq!(
            table.get(0, "Name"),
            Some(&CellValue::Text("Bill Clinton".to_string()))
        );
        assert_eq!(table.get(0, "B"), Some(&CellValue::Number(42.0)));
        assert_eq!(table.get(0, "7"), Some(&CellValue::Bool(true)));
    }

    #[test]
    fn convert_cell_maps_blank_to_empty_text() {
        assert_eq!(convert_cell(None), CellValue::Text(String::new()));
        assert_eq!(
            convert_cell(Some(&Data::Empty)),
            CellValue::Text(String::new())
        );
        assert_eq!(convert_cell(Some(&Data::Int(7))), CellValue::Number(7.0));
        assert_eq!(convert_cell(Some(&Data::Bool(true))), CellValue::Bool(true));
    }
}
