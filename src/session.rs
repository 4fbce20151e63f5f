use std::sync::mpsc::{channel, Receiver, Sender};
use tracing::{debug, warn};

use crate::error::{DecodeError, SessionError};
use crate::types::{LoadTicket, SessionState, Table, TableEvent};
use crate::{editor, exporter, loader};

/// What became of a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result replaced the session's table.
    Applied,
    /// The decode failed; the previous table, if any, is untouched.
    Failed,
    /// A newer load was issued in the meantime; the result was discarded.
    Stale,
}

/// Owns the table and drives the load/edit/export pipeline.
///
/// Single-writer by construction: user actions are serialized, so no
/// locking is involved. Concurrent loads are resolved by generation,
/// last load wins.
pub struct Session {
    state: SessionState,
    table: Option<Table>,
    generation: u64,
    source_fingerprint: Option<String>,
    observers: Vec<Sender<TableEvent>>,
}

impl Session {
    pub fn new() -> Self {
        Session {
            state: SessionState::Unloaded,
            table: None,
            generation: 0,
            source_fingerprint: None,
            observers: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    /// Fingerprint of the source the current table was loaded from.
    pub fn source_fingerprint(&self) -> Option<&str> {
        self.source_fingerprint.as_deref()
    }

    /// Register an observer. Events are delivered over a channel; a dropped
    /// receiver unsubscribes itself on the next emit.
    pub fn subscribe(&mut self) -> Receiver<TableEvent> {
        let (tx, rx) = channel();
        self.observers.push(tx);
        rx
    }

    /// Start a load. The returned ticket identifies this request; only the
    /// ticket from the most recent `begin_load` can still apply its result.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.generation += 1;
        self.state = SessionState::Loading;
        debug!(generation = self.generation, "load started");
        LoadTicket {
            generation: self.generation,
        }
    }

    /// Complete a load begun with [`Session::begin_load`].
    ///
    /// A stale ticket's result is discarded without touching the table. A
    /// decode failure likewise leaves the previous table in place; only a
    /// fresh successful result replaces it.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Table, DecodeError>,
    ) -> LoadOutcome {
        if ticket.generation != self.generation {
            warn!(
                generation = ticket.generation,
                latest = self.generation,
                "discarding stale load result"
            );
            self.emit(TableEvent::StaleLoadDiscarded {
                generation: ticket.generation,
            });
            return LoadOutcome::Stale;
        }

        match result {
            Ok(table) => {
                let rows = table.row_count();
                self.table = Some(table);
                self.state = SessionState::Loaded;
                self.emit(TableEvent::Loaded {
                    generation: ticket.generation,
                    rows,
                });
                LoadOutcome::Applied
            }
            Err(err) => {
                self.state = SessionState::LoadFailed;
                self.emit(TableEvent::LoadFailed {
                    generation: ticket.generation,
                    message: err.to_string(),
                });
                LoadOutcome::Failed
            }
        }
    }

    /// Decode a byte source and apply it in one step.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> LoadOutcome {
        let ticket = self.begin_load();
        let fingerprint = loader::fingerprint(bytes);
        let result = loader::load_bytes(bytes);

        let outcome = self.finish_load(ticket, result);
        if outcome == LoadOutcome::Applied {
            self.source_fingerprint = Some(fingerprint);
        }
        outcome
    }

    /// Apply a raw string edit to one cell of the current table.
    pub fn edit_cell(
        &mut self,
        row: usize,
        column: &str,
        raw: &str,
    ) -> Result<(), SessionError> {
        if self.state == SessionState::Loading {
            return Err(SessionError::LoadInFlight);
        }

        let table = self.table.as_mut().ok_or(SessionError::NoTable)?;
        let record = table.row_mut(row).ok_or(SessionError::RowOutOfRange(row))?;

        editor::edit(record, column, raw)?;

        self.state = SessionState::Loaded;
        self.emit(TableEvent::CellEdited {
            row,
            column: column.to_string(),
        });
        Ok(())
    }

    /// Serialize the current table to xlsx bytes. Leaves the table as-is
    /// whether the export succeeds or fails.
    pub fn export(&mut self) -> Result<Vec<u8>, SessionError> {
        if self.state == SessionState::Loading {
            return Err(SessionError::LoadInFlight);
        }
        let table = match self.table.as_ref() {
            Some(table) => table,
            None => return Err(SessionError::NoTable),
        };

        self.state = SessionState::Exporting;
        let result = exporter::export(table);

        match result {
            Ok(bytes) => {
                self.state = SessionState::Exported;
                self.emit(TableEvent::Exported { bytes: bytes.len() });
                Ok(bytes)
            }
            Err(err) => {
                self.state = SessionState::ExportFailed;
                self.emit(TableEvent::ExportFailed {
                    message: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    fn emit(&mut self, event: TableEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellValue, Record};

    fn sample_table(marker: f64) -> Table {
        Table::new(
            vec!["Name".to_string(), "Index".to_string()],
            vec![Record::new(vec![
                ("Name".to_string(), CellValue::Text("Bill Clinton".to_string())),
                ("Index".to_string(), CellValue::Number(marker)),
            ])],
        )
    }

    #[test]
    fn fresh_session_is_unloaded() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Unloaded);
        assert!(session.table().is_none());
    }

    #[test]
    fn finish_load_applies_fresh_result() {
        let mut session = Session::new();
        let ticket = session.begin_load();
        assert_eq!(session.state(), SessionState::Loading);

        let outcome = session.finish_load(ticket, Ok(sample_table(42.0)));
        assert_eq!(outcome, LoadOutcome::Applied);
        assert_eq!(session.state(), SessionState::Loaded);
        assert_eq!(session.table().unwrap().row_count(), 1);
    }

    #[test]
    fn stale_ticket_result_is_discarded() {
        let mut session = Session::new();
        let ticket_a = session.begin_load();
        let ticket_b = session.begin_load();

        // B resolves first and wins.
        assert_eq!(
            session.finish_load(ticket_b, Ok(sample_table(2.0))),
            LoadOutcome::Applied
        );
        // A resolves later; its result must never reach the table.
        assert_eq!(
            session.finish_load(ticket_a, Ok(sample_table(1.0))),
            LoadOutcome::Stale
        );

        assert_eq!(
            session.table().unwrap().get(0, "Index"),
            Some(&CellValue::Number(2.0))
        );
    }

    #[test]
    fn failed_load_keeps_previous_table() {
        let mut session = Session::new();
        let ticket = session.begin_load();
        session.finish_load(ticket, Ok(sample_table(42.0)));

        let ticket = session.begin_load();
        let outcome = session.finish_load(
            ticket,
            Err(crate::error::DecodeError::EmptyWorkbook),
        );
        assert_eq!(outcome, LoadOutcome::Failed);
        assert_eq!(session.state(), SessionState::LoadFailed);
        assert_eq!(
            session.table().unwrap().get(0, "Index"),
            Some(&CellValue::Number(42.0))
        );
    }

    #[test]
    fn edits_are_rejected_mid_load() {
        let mut session = Session::new();
        let ticket = session.begin_load();
        session.finish_load(ticket, Ok(sample_table(42.0)));

        let _pending = session.begin_load();
        assert!(matches!(
            session.edit_cell(0, "Index", "43"),
            Err(SessionError::LoadInFlight)
        ));
    }

    #[test]
    fn edit_and_export_round_trip_through_session() {
        let mut session = Session::new();
        let events = session.subscribe();

        let ticket = session.begin_load();
        session.finish_load(ticket, Ok(sample_table(42.0)));
        session.edit_cell(0, "Index", "43").unwrap();

        let bytes = session.export().unwrap();
        assert!(!bytes.is_empty());
        assert_eq!(session.state(), SessionState::Exported);

        let seen: Vec<TableEvent> = events.try_iter().collect();
        assert!(matches!(seen[0], TableEvent::Loaded { rows: 1, .. }));
        assert_eq!(
            seen[1],
            TableEvent::CellEdited {
                row: 0,
                column: "Index".to_string()
            }
        );
        assert!(matches!(seen[2], TableEvent::Exported { .. }));
    }

    #[test]
    fn export_without_table_fails() {
        let mut session = Session::new();
        assert!(matches!(session.export(), Err(SessionError::NoTable)));
    }

    #[test]
    fn coercion_failure_surfaces_and_leaves_cell() {
        let mut session = Session::new();
        let ticket = session.begin_load();
        session.finish_load(ticket, Ok(sample_table(42.0)));

        let err = session.edit_cell(0, "Index", "forty").unwrap_err();
        assert!(matches!(err, SessionError::Coercion(_)));
        assert_eq!(
            session.table().unwrap().get(0, "Index"),
            Some(&CellValue::Number(42.0))
        );
    }
}
