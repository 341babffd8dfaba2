use std::cmp::Ordering;
use std::fmt;

/// Key type for the only index this core supports: an ordered pair of
/// signed integer columns, compared lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub a: i32,
    pub b: i32,
}

pub const INDEX_KEY_SIZE: usize = 8;

impl IndexKey {
    pub fn new(a: i32, b: i32) -> Self {
        Self { a, b }
    }

    pub fn to_bytes(self) -> [u8; INDEX_KEY_SIZE] {
        let mut bytes = [0u8; INDEX_KEY_SIZE];
        bytes[0..4].copy_from_slice(&self.a.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.b.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        assert_eq!(bytes.len(), INDEX_KEY_SIZE);
        let a = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let b = i32::from_le_bytes(bytes[4..8].try_into().unwrap());
        Self { a, b }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.a.cmp(&other.a).then(self.b.cmp(&other.b))
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.a, self.b)
    }
}

impl From<(i32, i32)> for IndexKey {
    fn from((a, b): (i32, i32)) -> Self {
        Self::new(a, b)
    }
}
