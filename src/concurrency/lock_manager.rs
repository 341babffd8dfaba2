use std::collections::HashMap;
use std::sync::{Arc, Weak};

use log::{debug, trace, warn};
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::common::{AbortReason, RecordId, RelCoreError, Result, TableId, TransactionId};
use crate::txn::{IsolationLevel, Transaction, TransactionManager, TransactionState};

use super::lock_mode::LockMode;

/// One transaction's ask for a lock on a resource, granted or still waiting.
#[derive(Debug, Clone)]
struct LockRequest {
    txn_id: TransactionId,
    lock_mode: LockMode,
    granted: bool,
}

/// Per-resource wait queue. `upgrading` serializes upgrade attempts: at most
/// one transaction may be mid-upgrade on a given resource at a time.
#[derive(Debug, Default)]
struct LockRequestQueue {
    requests: Vec<LockRequest>,
    upgrading: Option<TransactionId>,
}

/// A lockable resource's request queue plus the condvar waiters block on.
struct ResourceQueue {
    state: Mutex<LockRequestQueue>,
    cv: Condvar,
}

impl ResourceQueue {
    fn new() -> Self {
        Self { state: Mutex::new(LockRequestQueue::default()), cv: Condvar::new() }
    }
}

/// Multi-granularity lock manager implementing strict two-phase locking.
///
/// Tables and rows each get their own map of resource id to `ResourceQueue`.
/// Granting is cooperative: a thread appends its request, then blocks on the
/// resource's condvar until no granted, incompatible request remains ahead of
/// it. `DeadlockDetector` breaks cycles by aborting a transaction and waking
/// every waiter so it can notice and unwind.
pub struct LockManager {
    table_lock_map: Mutex<HashMap<TableId, Arc<ResourceQueue>>>,
    row_lock_map: Mutex<HashMap<RecordId, Arc<ResourceQueue>>>,
    txn_registry: Mutex<HashMap<TransactionId, Weak<Transaction>>>,
    txn_manager: Mutex<Option<Weak<TransactionManager>>>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            table_lock_map: Mutex::new(HashMap::new()),
            row_lock_map: Mutex::new(HashMap::new()),
            txn_registry: Mutex::new(HashMap::new()),
            txn_manager: Mutex::new(None),
        }
    }

    pub fn register_transaction(&self, txn: &Arc<Transaction>) {
        self.txn_registry.lock().insert(txn.id(), Arc::downgrade(txn));
    }

    /// Used by the deadlock detector to reach a transaction by id and mark
    /// it an abort victim without holding a strong reference forever.
    pub fn lookup_transaction(&self, txn_id: TransactionId) -> Option<Arc<Transaction>> {
        self.txn_registry.lock().get(&txn_id)?.upgrade()
    }

    /// Wires a back reference to the transaction manager that owns this lock
    /// manager, so the deadlock detector can route a victim through full
    /// `Abort` (state flip plus lock release) instead of only flipping its
    /// state and leaving its already-granted locks held.
    pub fn bind_transaction_manager(&self, txn_manager: &Arc<TransactionManager>) {
        *self.txn_manager.lock() = Some(Arc::downgrade(txn_manager));
    }

    /// Aborts `txn_id` on the deadlock detector's behalf: routes through the
    /// bound transaction manager when one is wired in, so the victim's held
    /// locks are released and waiters can actually make progress. Falls back
    /// to flipping the transaction's state alone if no manager is bound,
    /// which only happens in tests that drive `LockManager` directly.
    pub fn abort_for_deadlock(&self, txn_id: TransactionId) {
        let bound = self.txn_manager.lock().as_ref().and_then(Weak::upgrade);
        if let Some(txn_manager) = bound {
            if let Some(txn) = txn_manager.get_transaction(txn_id) {
                txn_manager.abort(&txn);
                return;
            }
        }
        if let Some(txn) = self.lookup_transaction(txn_id) {
            txn.set_state(TransactionState::Aborted);
        }
    }

    /// Snapshot of table resources with at least one waiting or granted
    /// request, for the deadlock detector's wait-for graph.
    pub fn table_resources(&self) -> Vec<(TableId, Arc<ResourceQueueHandle>)> {
        self.table_lock_map
            .lock()
            .iter()
            .map(|(id, q)| (*id, Arc::new(ResourceQueueHandle(q.clone()))))
            .collect()
    }

    /// Snapshot of row resources with at least one waiting or granted
    /// request, for the deadlock detector's wait-for graph.
    pub fn row_resources(&self) -> Vec<(RecordId, Arc<ResourceQueueHandle>)> {
        self.row_lock_map
            .lock()
            .iter()
            .map(|(id, q)| (*id, Arc::new(ResourceQueueHandle(q.clone()))))
            .collect()
    }

    /// Wakes every waiter on every resource. Called after the deadlock
    /// detector aborts a victim so the waiter notices and unwinds instead of
    /// blocking until some unrelated lock churns the queue.
    pub fn notify_all(&self) {
        for queue in self.table_lock_map.lock().values() {
            queue.cv.notify_all();
        }
        for queue in self.row_lock_map.lock().values() {
            queue.cv.notify_all();
        }
    }

    fn abort(&self, txn: &Transaction, reason: AbortReason) -> RelCoreError {
        txn.set_state(TransactionState::Aborted);
        RelCoreError::TxnAbort(txn.id(), reason)
    }

    /// Strict 2PL + isolation-level gating, checked before a lock is even
    /// queued. Mirrors `CanTxnTakeLock`: a transaction may never acquire a
    /// new lock once shrinking (READ_COMMITTED excepts S-type locks), and
    /// READ_UNCOMMITTED never takes shared-family locks at all since it never
    /// needs them to avoid dirty reads.
    fn can_txn_take_lock(&self, txn: &Transaction, mode: LockMode) -> Result<()> {
        match txn.state() {
            TransactionState::Aborted | TransactionState::Committed => {
                return Err(RelCoreError::TxnAbort(txn.id(), AbortReason::LockOnShrinking));
            }
            TransactionState::Shrinking => {
                let allowed = matches!(txn.isolation_level(), IsolationLevel::ReadCommitted)
                    && matches!(mode, LockMode::Shared | LockMode::IntentionShared);
                if !allowed {
                    return Err(self.abort(txn, AbortReason::LockOnShrinking));
                }
            }
            TransactionState::Growing => {
                let is_shared_family = matches!(
                    mode,
                    LockMode::Shared | LockMode::IntentionShared | LockMode::SharedIntentionExclusive
                );
                if txn.isolation_level() == IsolationLevel::ReadUncommitted && is_shared_family {
                    return Err(self.abort(txn, AbortReason::LockSharedOnReadUncommitted));
                }
            }
        }
        Ok(())
    }

    /// Sets the 2PL phase transition that happens on releasing a `Shared` or
    /// `Exclusive` lock. Intention locks and SIX never drive the phase change
    /// on their own, matching `UnlockTable`/`UnlockRow`.
    fn transition_on_unlock(&self, txn: &Transaction, mode: LockMode) {
        if !matches!(mode, LockMode::Shared | LockMode::Exclusive) {
            return;
        }
        let should_shrink = match txn.isolation_level() {
            IsolationLevel::RepeatableRead => true,
            IsolationLevel::ReadCommitted => mode == LockMode::Exclusive,
            IsolationLevel::ReadUncommitted => true,
        };
        if should_shrink && txn.state() == TransactionState::Growing {
            txn.set_state(TransactionState::Shrinking);
        }
    }

    fn get_or_create_table_queue(&self, table_id: TableId) -> Arc<ResourceQueue> {
        self.table_lock_map.lock().entry(table_id).or_insert_with(|| Arc::new(ResourceQueue::new())).clone()
    }

    fn get_or_create_row_queue(&self, row_id: RecordId) -> Arc<ResourceQueue> {
        self.row_lock_map.lock().entry(row_id).or_insert_with(|| Arc::new(ResourceQueue::new())).clone()
    }

    /// Blocks until no granted request ahead of `txn_id` is incompatible
    /// with `mode`, or the transaction becomes an abort victim (of the
    /// deadlock detector, most likely) while waiting.
    fn wait_for_grant(
        &self,
        txn: &Transaction,
        state: &mut MutexGuard<'_, LockRequestQueue>,
        cv: &Condvar,
        mode: LockMode,
    ) -> bool {
        loop {
            if txn.state() == TransactionState::Aborted {
                return false;
            }
            let blocked = state
                .requests
                .iter()
                .any(|r| r.granted && r.txn_id != txn.id() && !r.lock_mode.compatible_with(mode));
            if !blocked {
                return true;
            }
            cv.wait(state);
        }
    }

    pub fn lock_table(&self, txn: &Arc<Transaction>, mode: LockMode, table_id: TableId) -> Result<bool> {
        self.can_txn_take_lock(txn, mode)?;
        let queue = self.get_or_create_table_queue(table_id);
        let mut state = queue.state.lock();

        if let Some(idx) = state.requests.iter().position(|r| r.txn_id == txn.id()) {
            let prev_mode = state.requests[idx].lock_mode;
            if prev_mode == mode {
                return Ok(true);
            }
            if state.upgrading.is_some() {
                return Err(self.abort(txn, AbortReason::UpgradeConflict));
            }
            if !prev_mode.can_upgrade_to(mode) {
                return Err(self.abort(txn, AbortReason::IncompatibleUpgrade));
            }

            state.upgrading = Some(txn.id());
            txn.remove_table_lock(prev_mode, table_id);
            state.requests[idx].lock_mode = mode;
            state.requests[idx].granted = false;
            debug!("txn {} upgrading table {} lock {:?} -> {:?}", txn.id(), table_id, prev_mode, mode);

            let granted = self.wait_for_grant(txn, &mut state, &queue.cv, mode);
            state.upgrading = None;
            if !granted {
                state.requests.retain(|r| r.txn_id != txn.id());
                queue.cv.notify_all();
                return Ok(false);
            }
            if let Some(r) = state.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
                r.granted = true;
            }
            txn.add_table_lock(mode, table_id);
            queue.cv.notify_all();
            return Ok(true);
        }

        state.requests.push(LockRequest { txn_id: txn.id(), lock_mode: mode, granted: false });
        trace!("txn {} queued for table {} lock {:?}", txn.id(), table_id, mode);
        let granted = self.wait_for_grant(txn, &mut state, &queue.cv, mode);
        if !granted {
            state.requests.retain(|r| r.txn_id != txn.id());
            queue.cv.notify_all();
            return Ok(false);
        }
        if let Some(r) = state.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
            r.granted = true;
        }
        txn.add_table_lock(mode, table_id);
        queue.cv.notify_all();
        Ok(true)
    }

    pub fn unlock_table(&self, txn: &Arc<Transaction>, table_id: TableId) -> Result<()> {
        self.unlock_table_impl(txn, table_id, false)
    }

    fn unlock_table_impl(&self, txn: &Arc<Transaction>, table_id: TableId, force: bool) -> Result<()> {
        let queue = {
            let map = self.table_lock_map.lock();
            match map.get(&table_id) {
                Some(q) => q.clone(),
                None if force => return Ok(()),
                None => return Err(self.abort(txn, AbortReason::AttemptedUnlockButNoLockHeld)),
            }
        };
        let mut state = queue.state.lock();
        let idx = match state.requests.iter().position(|r| r.txn_id == txn.id() && r.granted) {
            Some(i) => i,
            None if force => return Ok(()),
            None => return Err(self.abort(txn, AbortReason::AttemptedUnlockButNoLockHeld)),
        };

        if !force && txn.holds_any_row_lock_on_table(table_id) {
            return Err(self.abort(txn, AbortReason::TableUnlockedBeforeUnlockingRows));
        }

        let mode = state.requests.remove(idx).lock_mode;
        txn.remove_table_lock(mode, table_id);
        if !force {
            self.transition_on_unlock(txn, mode);
        }
        queue.cv.notify_all();
        Ok(())
    }

    pub fn lock_row(&self, txn: &Arc<Transaction>, mode: LockMode, table_id: TableId, row_id: RecordId) -> Result<bool> {
        if matches!(mode, LockMode::IntentionShared | LockMode::IntentionExclusive | LockMode::SharedIntentionExclusive) {
            return Err(self.abort(txn, AbortReason::AttemptedIntentionLockOnRow));
        }
        self.can_txn_take_lock(txn, mode)?;

        let has_table_lock = match mode {
            LockMode::Shared => txn.is_table_locked_any(table_id),
            LockMode::Exclusive => {
                txn.is_table_locked(LockMode::Exclusive, table_id)
                    || txn.is_table_locked(LockMode::IntentionExclusive, table_id)
                    || txn.is_table_locked(LockMode::SharedIntentionExclusive, table_id)
            }
            _ => unreachable!("row locks are only ever Shared or Exclusive"),
        };
        if !has_table_lock {
            return Err(self.abort(txn, AbortReason::TableLockNotPresent));
        }

        let queue = self.get_or_create_row_queue(row_id);
        let mut state = queue.state.lock();

        if let Some(idx) = state.requests.iter().position(|r| r.txn_id == txn.id()) {
            let prev_mode = state.requests[idx].lock_mode;
            if prev_mode == mode {
                return Ok(true);
            }
            if state.upgrading.is_some() {
                return Err(self.abort(txn, AbortReason::UpgradeConflict));
            }
            if !prev_mode.can_upgrade_to(mode) {
                return Err(self.abort(txn, AbortReason::IncompatibleUpgrade));
            }

            state.upgrading = Some(txn.id());
            txn.remove_row_lock(prev_mode, table_id, row_id);
            state.requests[idx].lock_mode = mode;
            state.requests[idx].granted = false;

            let granted = self.wait_for_grant(txn, &mut state, &queue.cv, mode);
            state.upgrading = None;
            if !granted {
                state.requests.retain(|r| r.txn_id != txn.id());
                queue.cv.notify_all();
                return Ok(false);
            }
            if let Some(r) = state.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
                r.granted = true;
            }
            txn.add_row_lock(mode, table_id, row_id);
            queue.cv.notify_all();
            return Ok(true);
        }

        state.requests.push(LockRequest { txn_id: txn.id(), lock_mode: mode, granted: false });
        let granted = self.wait_for_grant(txn, &mut state, &queue.cv, mode);
        if !granted {
            state.requests.retain(|r| r.txn_id != txn.id());
            queue.cv.notify_all();
            return Ok(false);
        }
        if let Some(r) = state.requests.iter_mut().find(|r| r.txn_id == txn.id()) {
            r.granted = true;
        }
        txn.add_row_lock(mode, table_id, row_id);
        queue.cv.notify_all();
        Ok(true)
    }

    pub fn unlock_row(&self, txn: &Arc<Transaction>, table_id: TableId, row_id: RecordId, force: bool) -> Result<()> {
        let queue = {
            let map = self.row_lock_map.lock();
            match map.get(&row_id) {
                Some(q) => q.clone(),
                None if force => return Ok(()),
                None => return Err(self.abort(txn, AbortReason::AttemptedUnlockButNoLockHeld)),
            }
        };
        let mut state = queue.state.lock();
        let idx = match state.requests.iter().position(|r| r.txn_id == txn.id() && r.granted) {
            Some(i) => i,
            None if force => return Ok(()),
            None => return Err(self.abort(txn, AbortReason::AttemptedUnlockButNoLockHeld)),
        };

        let mode = state.requests.remove(idx).lock_mode;
        txn.remove_row_lock(mode, table_id, row_id);
        if !force {
            self.transition_on_unlock(txn, mode);
        }
        queue.cv.notify_all();
        Ok(())
    }

    /// Releases every lock `txn` holds, rows first so the table-level
    /// "no outstanding row locks" invariant holds by the time table locks go.
    /// Used by the transaction manager at commit and abort; errors from
    /// individual releases are swallowed since the transaction is already
    /// terminating.
    pub fn release_all(&self, txn: &Arc<Transaction>) {
        for mode in [LockMode::Shared, LockMode::Exclusive] {
            for (table_id, row_id) in txn.row_ids(mode) {
                let _ = self.unlock_row(txn, table_id, row_id, true);
            }
        }
        for mode in [
            LockMode::Shared,
            LockMode::Exclusive,
            LockMode::IntentionShared,
            LockMode::IntentionExclusive,
            LockMode::SharedIntentionExclusive,
        ] {
            for table_id in txn.table_ids(mode) {
                if let Err(err) = self.unlock_table_impl(txn, table_id, true) {
                    warn!("releasing table {} lock for txn {}: {}", table_id, txn.id(), err);
                }
            }
        }
    }
}

/// Opaque handle over a resource's request queue, exposed to the deadlock
/// detector so it can read granted/waiting transaction ids without reaching
/// into `LockManager`'s private maps.
pub struct ResourceQueueHandle(Arc<ResourceQueue>);

impl ResourceQueueHandle {
    /// `(txn_id, granted)` for every request currently queued on this resource.
    pub fn requests(&self) -> Vec<(TransactionId, bool)> {
        self.0.state.lock().requests.iter().map(|r| (r.txn_id, r.granted)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PageId, SlotId};

    fn new_txn(id: i64, level: IsolationLevel) -> Arc<Transaction> {
        Arc::new(Transaction::new(TransactionId::new(id), level))
    }

    #[test]
    fn test_two_shared_table_locks_both_granted() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let t2 = new_txn(2, IsolationLevel::RepeatableRead);
        let table = TableId::new(1);

        assert!(lm.lock_table(&t1, LockMode::Shared, table).unwrap());
        assert!(lm.lock_table(&t2, LockMode::Shared, table).unwrap());
        assert!(t1.is_table_locked(LockMode::Shared, table));
        assert!(t2.is_table_locked(LockMode::Shared, table));
    }

    #[test]
    fn test_exclusive_table_lock_excludes_others() {
        let lm = Arc::new(LockManager::new());
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let t2 = new_txn(2, IsolationLevel::RepeatableRead);
        let table = TableId::new(1);

        assert!(lm.lock_table(&t1, LockMode::Exclusive, table).unwrap());

        let lm2 = lm.clone();
        let t2_clone = t2.clone();
        let handle = std::thread::spawn(move || lm2.lock_table(&t2_clone, LockMode::Shared, table).unwrap());

        std::thread::sleep(std::time::Duration::from_millis(20));
        lm.unlock_table(&t1, table).unwrap();
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_upgrade_shared_to_exclusive() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let table = TableId::new(1);

        assert!(lm.lock_table(&t1, LockMode::Shared, table).unwrap());
        assert!(lm.lock_table(&t1, LockMode::Exclusive, table).unwrap());
        assert!(t1.is_table_locked(LockMode::Exclusive, table));
        assert!(!t1.is_table_locked(LockMode::Shared, table));
    }

    #[test]
    fn test_row_lock_requires_table_intention_lock() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let table = TableId::new(1);
        let row = RecordId::new(PageId::new(0), SlotId::new(0));

        let err = lm.lock_row(&t1, LockMode::Shared, table, row).unwrap_err();
        assert!(matches!(err, RelCoreError::TxnAbort(_, AbortReason::TableLockNotPresent)));
    }

    #[test]
    fn test_row_lock_succeeds_with_table_intention_lock() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let table = TableId::new(1);
        let row = RecordId::new(PageId::new(0), SlotId::new(0));

        lm.lock_table(&t1, LockMode::IntentionExclusive, table).unwrap();
        assert!(lm.lock_row(&t1, LockMode::Exclusive, table, row).unwrap());
        assert!(t1.holds_any_row_lock_on_table(table));
    }

    #[test]
    fn test_repeatable_read_unlock_enters_shrinking() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let table = TableId::new(1);

        lm.lock_table(&t1, LockMode::Shared, table).unwrap();
        lm.unlock_table(&t1, table).unwrap();
        assert_eq!(t1.state(), TransactionState::Shrinking);
    }

    #[test]
    fn test_lock_after_shrinking_aborts_under_repeatable_read() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let table_a = TableId::new(1);
        let table_b = TableId::new(2);

        lm.lock_table(&t1, LockMode::Shared, table_a).unwrap();
        lm.unlock_table(&t1, table_a).unwrap();

        let err = lm.lock_table(&t1, LockMode::Shared, table_b).unwrap_err();
        assert!(matches!(err, RelCoreError::TxnAbort(_, AbortReason::LockOnShrinking)));
        assert_eq!(t1.state(), TransactionState::Aborted);
    }

    #[test]
    fn test_read_uncommitted_rejects_shared_lock() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::ReadUncommitted);
        let table = TableId::new(1);

        let err = lm.lock_table(&t1, LockMode::Shared, table).unwrap_err();
        assert!(matches!(err, RelCoreError::TxnAbort(_, AbortReason::LockSharedOnReadUncommitted)));
    }

    #[test]
    fn test_unlock_table_before_rows_released_aborts() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let table = TableId::new(1);
        let row = RecordId::new(PageId::new(0), SlotId::new(0));

        lm.lock_table(&t1, LockMode::IntentionExclusive, table).unwrap();
        lm.lock_row(&t1, LockMode::Exclusive, table, row).unwrap();

        let err = lm.unlock_table(&t1, table).unwrap_err();
        assert!(matches!(err, RelCoreError::TxnAbort(_, AbortReason::TableUnlockedBeforeUnlockingRows)));
    }

    #[test]
    fn test_release_all_drops_every_lock() {
        let lm = LockManager::new();
        let t1 = new_txn(1, IsolationLevel::RepeatableRead);
        let table = TableId::new(1);
        let row = RecordId::new(PageId::new(0), SlotId::new(0));

        lm.lock_table(&t1, LockMode::IntentionExclusive, table).unwrap();
        lm.lock_row(&t1, LockMode::Exclusive, table, row).unwrap();

        lm.release_all(&t1);
        assert!(!t1.is_table_locked_any(table));
        assert!(!t1.holds_any_row_lock_on_table(table));
    }
}
