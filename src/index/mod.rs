pub mod btree_index;
pub mod btree_iterator;
pub mod btree_page;
pub mod index_key;
pub mod key_comparator;

pub use btree_index::BTreeIndex;
pub use btree_iterator::BTreeIterator;
pub use btree_page::{
    HeaderPage, HeaderPageMut, InternalEntry, InternalPage, InternalPageMut, LeafEntry, LeafPage, LeafPageMut, PageKind,
    DUMMY_KEY,
};
pub use index_key::{IndexKey, INDEX_KEY_SIZE};
pub use key_comparator::{KeyComparator, TwoIntComparator};
