use parking_lot::Mutex;

use crate::common::{Lsn, TransactionId, INVALID_LSN};

/// A single entry accepted by the log manager. The manager is a passive
/// collaborator: it stamps and stores records but does not interpret them,
/// so recovery/redo/undo semantics live outside this crate.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub lsn: Lsn,
    pub txn_id: TransactionId,
    pub kind: LogRecordKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecordKind {
    Begin,
    Commit,
    Abort,
    /// Freeform note, e.g. "inserted into table" - callers decide the text.
    Note(String),
}

/// In-memory append-only log with a monotonically increasing LSN counter.
/// Deliberately minimal: no on-disk persistence, no checkpointing, no
/// recovery protocol. The point is giving callers a place to stamp and order
/// events, not a durable WAL.
pub struct LogManager {
    next_lsn: Mutex<Lsn>,
    records: Mutex<Vec<LogRecord>>,
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LogManager {
    pub fn new() -> Self {
        Self { next_lsn: Mutex::new(INVALID_LSN + 1), records: Mutex::new(Vec::new()) }
    }

    /// Appends a record and returns the LSN it was stamped with.
    pub fn append(&self, txn_id: TransactionId, kind: LogRecordKind) -> Lsn {
        let lsn = {
            let mut next = self.next_lsn.lock();
            let lsn = *next;
            *next += 1;
            lsn
        };
        self.records.lock().push(LogRecord { lsn, txn_id, kind });
        lsn
    }

    pub fn last_lsn(&self) -> Lsn {
        self.next_lsn.lock().saturating_sub(1)
    }

    /// Snapshot of every record appended so far, in LSN order.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }
}
