//! relcore - the storage and concurrency core of an educational disk-oriented
//! RDBMS.
//!
//! The crate stores data on persistent storage and uses a buffer pool to
//! cache frequently accessed pages in memory. It is deliberately scoped to
//! the layers below query execution: paging, caching, indexing, and the
//! transaction/locking machinery that makes concurrent access to those
//! layers safe.
//!
//! # Architecture
//!
//! - **Storage** (`storage`): disk I/O and on-disk page layout.
//!   - `DiskManager`: reads and writes fixed-size pages to/from a single
//!     database file.
//!   - `DiskScheduler`: a background worker that serializes disk I/O behind
//!     a request channel.
//!
//! - **Buffer pool** (`buffer`): in-memory page cache.
//!   - `BufferPoolManager`: fetches pages from disk, pins them in frames, and
//!     evicts via the replacer when the pool is full.
//!   - `LruKReplacer`: the LRU-K eviction policy.
//!   - `ReadPageGuard`/`WritePageGuard`/`BasicPageGuard`: RAII guards that tie
//!     a page's pin and latch to Rust's ownership system.
//!
//! - **Index** (`index`): a crabbing-latched B+Tree over a two-column integer
//!   key, the sole index type this core supports.
//!
//! - **Transactions** (`txn`): transaction identity, isolation level, and
//!   the state machine strict two-phase locking drives it through.
//!
//! - **Concurrency** (`concurrency`): the multi-granularity lock manager and
//!   its background deadlock detector.
//!
//! - **Logging** (`log_manager`): a minimal in-memory write-ahead log used to
//!   stamp and order operations; recovery is out of scope.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use relcore::buffer::BufferPoolManager;
//! use relcore::storage::disk::DiskManager;
//! use relcore::index::BTreeIndex;
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(100, 2, disk_manager));
//!
//! let index = BTreeIndex::new(bpm, 32, 32).unwrap();
//! assert!(index.is_empty().unwrap());
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod index;
pub mod log_manager;
pub mod storage;
pub mod txn;

// Re-export commonly used types at the crate root.
pub use common::{PageId, RecordId, RelCoreError, Result, SlotId};
