use std::sync::Arc;

use relcore::buffer::BufferPoolManager;
use relcore::common::{PageId, RecordId, SlotId, TableId};
use relcore::concurrency::{DeadlockDetector, LockManager, LockMode};
use relcore::index::{BTreeIndex, IndexKey};
use relcore::storage::disk::DiskManager;
use relcore::txn::{IsolationLevel, TransactionManager};

fn main() {
    env_logger::init();

    println!("relcore - storage and concurrency core of an educational RDBMS");
    println!("================================================================\n");

    let db_path = "demo.db";
    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to open database file"));
    let bpm = Arc::new(BufferPoolManager::new(32, 2, disk_manager));
    println!("opened buffer pool with 32 frames, LRU-2 replacement\n");

    let index = BTreeIndex::new(bpm.clone(), 8, 8).expect("failed to create index");
    println!("created B+Tree index (leaf_max=8, internal_max=8)");

    for key in [10, 20, 5, 15, 25, 30, 1, 40] {
        let rid = RecordId::new(PageId::new(key), SlotId::new(0));
        index.insert(IndexKey::new(key, 0), rid).expect("insert failed");
    }
    println!("inserted 8 keys");

    let found = index.get_value(IndexKey::new(15, 0)).unwrap();
    println!("lookup key 15 -> {:?}", found);

    let range = index.range_scan(IndexKey::new(5, 0), IndexKey::new(25, 0)).unwrap();
    println!("range scan [5, 25] -> {} entries", range.len());

    index.remove(IndexKey::new(20, 0)).expect("remove failed");
    println!("removed key 20, still present: {}", index.get_value(IndexKey::new(20, 0)).unwrap().is_some());

    println!("\n--- transactions and locking ---\n");

    let lock_manager = Arc::new(LockManager::new());
    let _deadlock_detector = DeadlockDetector::new(lock_manager.clone(), std::time::Duration::from_millis(50));
    let txn_manager = TransactionManager::new(lock_manager.clone());

    let txn = txn_manager.begin(IsolationLevel::RepeatableRead);
    println!("began transaction {}", txn.id());

    let table = TableId::new(1);
    lock_manager.lock_table(&txn, LockMode::IntentionExclusive, table).expect("table lock failed");
    let row = RecordId::new(PageId::new(7), SlotId::new(0));
    lock_manager.lock_row(&txn, LockMode::Exclusive, table, row).expect("row lock failed");
    println!("acquired IX table lock and X row lock");

    txn_manager.commit(&txn).expect("commit failed");
    println!("committed transaction {}, every lock released", txn.id());

    std::fs::remove_file(db_path).ok();
    println!("\ndemo completed successfully");
}
