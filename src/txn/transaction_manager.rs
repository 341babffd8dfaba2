use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::common::{Result, TransactionId};
use crate::concurrency::LockManager;

use super::transaction::{IsolationLevel, Transaction, TransactionState};

/// Issues transaction ids, tracks live transactions, and drives commit/abort
/// through the lock manager so every held lock is released exactly once.
pub struct TransactionManager {
    next_txn_id: AtomicI64,
    active: Mutex<HashMap<TransactionId, Arc<Transaction>>>,
    lock_manager: Arc<LockManager>,
}

impl TransactionManager {
    /// Wraps the new manager in an `Arc` and binds it back into
    /// `lock_manager` so the deadlock detector can route aborts through
    /// `Self::abort` instead of only flipping a victim's state.
    pub fn new(lock_manager: Arc<LockManager>) -> Arc<Self> {
        let txn_manager = Arc::new(Self {
            next_txn_id: AtomicI64::new(0),
            active: Mutex::new(HashMap::new()),
            lock_manager: lock_manager.clone(),
        });
        lock_manager.bind_transaction_manager(&txn_manager);
        txn_manager
    }

    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let id = TransactionId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
        let txn = Arc::new(Transaction::new(id, isolation_level));
        self.lock_manager.register_transaction(&txn);
        self.active.lock().insert(id, txn.clone());
        debug!("began transaction {id}");
        txn
    }

    pub fn get_transaction(&self, id: TransactionId) -> Option<Arc<Transaction>> {
        self.active.lock().get(&id).cloned()
    }

    /// Commits `txn`: releases every lock it holds and marks it committed.
    /// Strict 2PL permits this from either GROWING or SHRINKING.
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<()> {
        self.lock_manager.release_all(txn);
        txn.set_state(TransactionState::Committed);
        self.active.lock().remove(&txn.id());
        info!("committed transaction {}", txn.id());
        Ok(())
    }

    /// Aborts `txn`: releases every lock it holds and marks it aborted.
    pub fn abort(&self, txn: &Arc<Transaction>) {
        self.lock_manager.release_all(txn);
        txn.set_state(TransactionState::Aborted);
        self.active.lock().remove(&txn.id());
        info!("aborted transaction {}", txn.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_assigns_monotonic_ids() {
        let txn_manager = TransactionManager::new(Arc::new(LockManager::new()));
        let t1 = txn_manager.begin(IsolationLevel::RepeatableRead);
        let t2 = txn_manager.begin(IsolationLevel::RepeatableRead);
        assert!(t2.id().as_i64() > t1.id().as_i64());
        assert_eq!(t1.state(), TransactionState::Growing);
    }

    #[test]
    fn test_commit_clears_active_set_and_releases_locks() {
        let lock_manager = Arc::new(LockManager::new());
        let txn_manager = TransactionManager::new(lock_manager.clone());
        let txn = txn_manager.begin(IsolationLevel::RepeatableRead);

        let table = crate::common::TableId::new(1);
        lock_manager.lock_table(&txn, crate::concurrency::LockMode::Exclusive, table).unwrap();

        txn_manager.commit(&txn).unwrap();
        assert_eq!(txn.state(), TransactionState::Committed);
        assert!(txn_manager.get_transaction(txn.id()).is_none());
        assert!(!txn.is_table_locked_any(table));
    }
}
