use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::common::{RecordId, TableId, TransactionId};

use crate::concurrency::LockMode;

/// Read-phenomena isolation level, governing when strict 2PL lets a
/// transaction release locks relative to acquiring new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// Phase of a strict two-phase-locking transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// A single transaction's identity, isolation level, 2PL phase, and the
/// locks it currently holds. Shared via `Arc` between the caller and the
/// `LockManager`/`DeadlockDetector`, which mutate `state` concurrently.
pub struct Transaction {
    id: TransactionId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,

    table_shared: Mutex<HashSet<TableId>>,
    table_exclusive: Mutex<HashSet<TableId>>,
    table_intention_shared: Mutex<HashSet<TableId>>,
    table_intention_exclusive: Mutex<HashSet<TableId>>,
    table_shared_intention_exclusive: Mutex<HashSet<TableId>>,

    row_shared: Mutex<HashMap<TableId, HashSet<RecordId>>>,
    row_exclusive: Mutex<HashMap<TableId, HashSet<RecordId>>>,
}

impl Transaction {
    pub fn new(id: TransactionId, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            table_shared: Mutex::new(HashSet::new()),
            table_exclusive: Mutex::new(HashSet::new()),
            table_intention_shared: Mutex::new(HashSet::new()),
            table_intention_exclusive: Mutex::new(HashSet::new()),
            table_shared_intention_exclusive: Mutex::new(HashSet::new()),
            row_shared: Mutex::new(HashMap::new()),
            row_exclusive: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    fn table_set(&self, mode: LockMode) -> &Mutex<HashSet<TableId>> {
        match mode {
            LockMode::Shared => &self.table_shared,
            LockMode::Exclusive => &self.table_exclusive,
            LockMode::IntentionShared => &self.table_intention_shared,
            LockMode::IntentionExclusive => &self.table_intention_exclusive,
            LockMode::SharedIntentionExclusive => &self.table_shared_intention_exclusive,
        }
    }

    pub fn add_table_lock(&self, mode: LockMode, table_id: TableId) {
        self.table_set(mode).lock().insert(table_id);
    }

    pub fn remove_table_lock(&self, mode: LockMode, table_id: TableId) {
        self.table_set(mode).lock().remove(&table_id);
    }

    pub fn is_table_locked(&self, mode: LockMode, table_id: TableId) -> bool {
        self.table_set(mode).lock().contains(&table_id)
    }

    pub fn is_table_locked_any(&self, table_id: TableId) -> bool {
        [
            LockMode::Shared,
            LockMode::Exclusive,
            LockMode::IntentionShared,
            LockMode::IntentionExclusive,
            LockMode::SharedIntentionExclusive,
        ]
        .into_iter()
        .any(|mode| self.is_table_locked(mode, table_id))
    }

    fn row_set(&self, mode: LockMode) -> &Mutex<HashMap<TableId, HashSet<RecordId>>> {
        match mode {
            LockMode::Shared => &self.row_shared,
            LockMode::Exclusive => &self.row_exclusive,
            other => panic!("rows only take shared/exclusive locks, got {other:?}"),
        }
    }

    pub fn add_row_lock(&self, mode: LockMode, table_id: TableId, row_id: RecordId) {
        self.row_set(mode).lock().entry(table_id).or_default().insert(row_id);
    }

    pub fn remove_row_lock(&self, mode: LockMode, table_id: TableId, row_id: RecordId) {
        if let Some(rows) = self.row_set(mode).lock().get_mut(&table_id) {
            rows.remove(&row_id);
        }
    }

    pub fn holds_any_row_lock_on_table(&self, table_id: TableId) -> bool {
        let shared_has = self.row_shared.lock().get(&table_id).is_some_and(|s| !s.is_empty());
        let exclusive_has = self.row_exclusive.lock().get(&table_id).is_some_and(|s| !s.is_empty());
        shared_has || exclusive_has
    }

    /// Snapshot of every table this transaction currently holds `mode` on,
    /// for the lock manager to walk while releasing everything at commit/abort.
    pub fn table_ids(&self, mode: LockMode) -> Vec<TableId> {
        self.table_set(mode).lock().iter().copied().collect()
    }

    /// Snapshot of every `(table, row)` pair this transaction holds `mode` on.
    pub fn row_ids(&self, mode: LockMode) -> Vec<(TableId, RecordId)> {
        self.row_set(mode)
            .lock()
            .iter()
            .flat_map(|(table_id, rows)| rows.iter().map(move |row_id| (*table_id, *row_id)))
            .collect()
    }
}
