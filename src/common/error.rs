use thiserror::Error;

use super::types::{FrameId, PageId, TransactionId};

/// Why the lock manager rejected a lock request outright (as opposed to a
/// transaction losing a wait while blocked, which surfaces as `Ok(false)`
/// rather than one of these).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    LockOnShrinking,
    UpgradeConflict,
    IncompatibleUpgrade,
    AttemptedIntentionLockOnRow,
    TableLockNotPresent,
    AttemptedUnlockButNoLockHeld,
    TableUnlockedBeforeUnlockingRows,
    LockSharedOnReadUncommitted,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AbortReason::LockOnShrinking => "LOCK_ON_SHRINKING",
            AbortReason::UpgradeConflict => "UPGRADE_CONFLICT",
            AbortReason::IncompatibleUpgrade => "INCOMPATIBLE_UPGRADE",
            AbortReason::AttemptedIntentionLockOnRow => "ATTEMPTED_INTENTION_LOCK_ON_ROW",
            AbortReason::TableLockNotPresent => "TABLE_LOCK_NOT_PRESENT",
            AbortReason::AttemptedUnlockButNoLockHeld => "ATTEMPTED_UNLOCK_BUT_NO_LOCK_HELD",
            AbortReason::TableUnlockedBeforeUnlockingRows => "TABLE_UNLOCKED_BEFORE_UNLOCKING_ROWS",
            AbortReason::LockSharedOnReadUncommitted => "LOCK_SHARED_ON_READ_UNCOMMITTED",
        };
        write!(f, "{s}")
    }
}

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum RelCoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("page {0} not found")]
    PageNotFound(PageId),

    #[error("frame {0} not found")]
    FrameNotFound(FrameId),

    #[error("buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("invalid page id: {0}")]
    InvalidPageId(PageId),

    #[error("invalid frame id: {0}")]
    InvalidFrameId(FrameId),

    #[error("page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("lock poisoned")]
    LockPoisoned,

    #[error("channel error: {0}")]
    Channel(String),

    #[error("duplicate key")]
    DuplicateKey,

    #[error("key not found")]
    KeyNotFound,

    #[error("index corrupted: {0}")]
    IndexCorrupted(String),

    #[error("transaction {0} aborted: {1}")]
    TxnAbort(TransactionId, AbortReason),
}

pub type Result<T> = std::result::Result<T, RelCoreError>;
