use std::time::Duration;

use super::types::{FrameId, PageId, TransactionId};

/// Size of a page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel for "no page".
pub const INVALID_PAGE_ID: PageId = PageId(-1);

/// Sentinel for "no frame".
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Sentinel for "no transaction".
pub const INVALID_TXN_ID: TransactionId = TransactionId(-1);

/// The page reserved for the B+Tree header (root pointer) in a freshly
/// created database file. Table catalogs, out of scope here, would claim
/// their own reserved pages starting after this one.
pub const HEADER_PAGE_ID: PageId = PageId(0);

/// Default K value for LRU-K replacement policy.
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames).
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;

/// Default B+Tree internal fanout.
pub const DEFAULT_INTERNAL_MAX_SIZE: usize = 128;

/// Default B+Tree leaf fanout.
pub const DEFAULT_LEAF_MAX_SIZE: usize = 128;

/// Default interval between deadlock-detector ticks.
pub const DEFAULT_CYCLE_DETECTION_INTERVAL: Duration = Duration::from_millis(50);

/// Runtime-constructible configuration, generalizing the defaults above into
/// something a caller can override per database instance.
#[derive(Debug, Clone)]
pub struct DbOptions {
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// K for the LRU-K replacer.
    pub replacer_k: usize,
    /// Max entries in a B+Tree leaf page before it splits.
    pub leaf_max_size: usize,
    /// Max entries in a B+Tree internal page before it splits.
    pub internal_max_size: usize,
    /// How often the deadlock detector rebuilds the wait-for graph.
    pub cycle_detection_interval: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_BUFFER_POOL_SIZE,
            replacer_k: DEFAULT_LRUK_K,
            leaf_max_size: DEFAULT_LEAF_MAX_SIZE,
            internal_max_size: DEFAULT_INTERNAL_MAX_SIZE,
            cycle_detection_interval: DEFAULT_CYCLE_DETECTION_INTERVAL,
        }
    }
}
