use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, trace};

use crate::common::TransactionId;

use super::lock_manager::{LockManager, ResourceQueueHandle};

/// Periodically scans `LockManager`'s wait queues for a wait-for cycle and
/// breaks it by aborting the youngest transaction in the cycle.
///
/// The underlying lock manager never detects cycles itself (every wait
/// blocks on a condvar with no timeout), so without this a genuine deadlock
/// hangs forever. Runs as a background thread in the shape of
/// [`crate::storage::disk::DiskScheduler`]'s worker: an `AtomicBool` shutdown
/// flag plus a joined handle on drop, except polling is a plain sleep loop
/// rather than a channel, since there is no per-request work to dispatch.
pub struct DeadlockDetector {
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DeadlockDetector {
    pub fn new(lock_manager: Arc<LockManager>, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            Self::run(lock_manager, shutdown_clone, interval);
        });

        Self { shutdown, handle: Some(handle) }
    }

    fn run(lock_manager: Arc<LockManager>, shutdown: Arc<AtomicBool>, interval: Duration) {
        while !shutdown.load(Ordering::Relaxed) {
            thread::sleep(interval);
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            Self::run_cycle_detection(&lock_manager);
        }
    }

    /// Breaks every cycle currently present, not just one: aborting a single
    /// victim can leave an unrelated second cycle standing, so this rebuilds
    /// the graph and retries until a pass finds nothing.
    fn run_cycle_detection(lock_manager: &LockManager) {
        loop {
            let graph = Self::build_wait_for_graph(lock_manager);
            let Some(cycle) = Self::find_cycle(&graph) else {
                break;
            };
            trace!("deadlock cycle detected: {:?}", cycle);
            if !Self::break_cycle(lock_manager, &cycle) {
                break;
            }
        }
    }

    fn build_wait_for_graph(lock_manager: &LockManager) -> BTreeMap<TransactionId, BTreeSet<TransactionId>> {
        let mut edges: BTreeMap<TransactionId, BTreeSet<TransactionId>> = BTreeMap::new();
        for (_, handle) in lock_manager.table_resources() {
            Self::add_resource_edges(&handle, &mut edges);
        }
        for (_, handle) in lock_manager.row_resources() {
            Self::add_resource_edges(&handle, &mut edges);
        }
        edges
    }

    fn add_resource_edges(
        handle: &ResourceQueueHandle,
        edges: &mut BTreeMap<TransactionId, BTreeSet<TransactionId>>,
    ) {
        let requests = handle.requests();
        let granted: Vec<TransactionId> = requests.iter().filter(|(_, g)| *g).map(|(id, _)| *id).collect();
        let waiting: Vec<TransactionId> = requests.iter().filter(|(_, g)| !*g).map(|(id, _)| *id).collect();
        for &waiter in &waiting {
            for &holder in &granted {
                if waiter != holder {
                    edges.entry(waiter).or_default().insert(holder);
                }
            }
        }
    }

    /// Depth-first search over the wait-for graph: start vertices in
    /// ascending txn_id order, neighbors within each vertex in descending
    /// txn_id order, so two runs over the same graph always report the same
    /// cycle.
    fn find_cycle(edges: &BTreeMap<TransactionId, BTreeSet<TransactionId>>) -> Option<Vec<TransactionId>> {
        let mut visited = BTreeSet::new();
        for &start in edges.keys() {
            if visited.contains(&start) {
                continue;
            }
            let mut on_stack = BTreeSet::new();
            let mut stack = Vec::new();
            if let Some(cycle) = Self::dfs(start, edges, &mut visited, &mut on_stack, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs(
        node: TransactionId,
        edges: &BTreeMap<TransactionId, BTreeSet<TransactionId>>,
        visited: &mut BTreeSet<TransactionId>,
        on_stack: &mut BTreeSet<TransactionId>,
        stack: &mut Vec<TransactionId>,
    ) -> Option<Vec<TransactionId>> {
        visited.insert(node);
        on_stack.insert(node);
        stack.push(node);

        if let Some(neighbors) = edges.get(&node) {
            // Descending txn_id order within each vertex's adjacency, per the
            // deterministic traversal the detector is required to follow.
            for &next in neighbors.iter().rev() {
                if on_stack.contains(&next) {
                    let start = stack.iter().position(|&n| n == next).expect("next is on_stack");
                    return Some(stack[start..].to_vec());
                }
                if !visited.contains(&next) {
                    if let Some(cycle) = Self::dfs(next, edges, visited, on_stack, stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        on_stack.remove(&node);
        None
    }

    /// Aborts the youngest (largest id) transaction in `cycle` and wakes
    /// every waiter so it notices. Returns false if the chosen victim is no
    /// longer registered, which stops `run_cycle_detection` from looping
    /// forever on a graph it can't make progress on.
    fn break_cycle(lock_manager: &LockManager, cycle: &[TransactionId]) -> bool {
        let Some(&victim_id) = cycle.iter().max() else {
            return false;
        };
        if lock_manager.lookup_transaction(victim_id).is_none() {
            return false;
        }
        info!("deadlock detector aborting transaction {victim_id} to break cycle");
        lock_manager.abort_for_deadlock(victim_id);
        lock_manager.notify_all();
        true
    }
}

impl Drop for DeadlockDetector {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
