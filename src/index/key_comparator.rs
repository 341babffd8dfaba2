use std::cmp::Ordering;

use super::index_key::IndexKey;

pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// The comparator wired into `BTreeIndex`: keys are a pair of `i32` columns,
/// compared lexicographically.
pub struct TwoIntComparator;

impl KeyComparator for TwoIntComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        IndexKey::from_bytes(a).cmp(&IndexKey::from_bytes(b))
    }
}
