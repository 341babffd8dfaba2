use std::cmp::Ordering;

use crate::common::{PageId, RecordId, SlotId, PAGE_SIZE};

use super::index_key::{IndexKey, INDEX_KEY_SIZE};
use super::key_comparator::KeyComparator;

const PAGE_TYPE_OFFSET: usize = 0;
const SIZE_OFFSET: usize = 1;
const MAX_SIZE_OFFSET: usize = 3;
const COMMON_HEADER_SIZE: usize = 5;

const ROOT_PAGE_ID_OFFSET: usize = COMMON_HEADER_SIZE;

const NEXT_PAGE_ID_OFFSET: usize = COMMON_HEADER_SIZE;
const LEAF_ENTRIES_OFFSET: usize = NEXT_PAGE_ID_OFFSET + 4;
const INTERNAL_ENTRIES_OFFSET: usize = COMMON_HEADER_SIZE;

const VALUE_SIZE: usize = 6; // RecordId: PageId(4) + SlotId(2)
const CHILD_SIZE: usize = 4; // PageId
const LEAF_ENTRY_SIZE: usize = INDEX_KEY_SIZE + VALUE_SIZE;
const INTERNAL_ENTRY_SIZE: usize = INDEX_KEY_SIZE + CHILD_SIZE;

const INVALID_PAGE_RAW: i32 = -1;

/// `entries[0].0` of an internal page's entry list is a dummy key (pivot
/// semantics, never compared against). A page reset to empty therefore
/// starts with this placeholder for that slot once a first child is set.
pub const DUMMY_KEY: IndexKey = IndexKey { a: i32::MIN, b: i32::MIN };

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Header,
    Internal,
    Leaf,
}

impl PageKind {
    fn from_byte(b: u8) -> Self {
        match b {
            0 => PageKind::Header,
            1 => PageKind::Internal,
            2 => PageKind::Leaf,
            other => panic!("unknown B+Tree page kind byte {other}"),
        }
    }

    fn as_byte(self) -> u8 {
        match self {
            PageKind::Header => 0,
            PageKind::Internal => 1,
            PageKind::Leaf => 2,
        }
    }
}

fn read_page_id(data: &[u8], offset: usize) -> PageId {
    let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    PageId::new(i32::from_le_bytes(bytes))
}

fn write_page_id(data: &mut [u8], offset: usize, page_id: PageId) {
    data[offset..offset + 4].copy_from_slice(&page_id.as_i32().to_le_bytes());
}

fn read_optional_page_id(data: &[u8], offset: usize) -> Option<PageId> {
    let bytes: [u8; 4] = data[offset..offset + 4].try_into().unwrap();
    let raw = i32::from_le_bytes(bytes);
    if raw == INVALID_PAGE_RAW {
        None
    } else {
        Some(PageId::new(raw))
    }
}

fn write_optional_page_id(data: &mut [u8], offset: usize, page_id: Option<PageId>) {
    let raw = page_id.map(|p| p.as_i32()).unwrap_or(INVALID_PAGE_RAW);
    data[offset..offset + 4].copy_from_slice(&raw.to_le_bytes());
}

/// Read-only view over the common header shared by header/internal/leaf
/// pages. Most call sites want a more specific view; this is the entry point
/// used to dispatch on `page_kind()` first.
pub struct BTreePageView<'a> {
    data: &'a [u8],
}

impl<'a> BTreePageView<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn page_kind(&self) -> PageKind {
        PageKind::from_byte(self.data[PAGE_TYPE_OFFSET])
    }

    pub fn size(&self) -> u16 {
        u16::from_le_bytes(self.data[SIZE_OFFSET..SIZE_OFFSET + 2].try_into().unwrap())
    }

    pub fn max_size(&self) -> u16 {
        u16::from_le_bytes(self.data[MAX_SIZE_OFFSET..MAX_SIZE_OFFSET + 2].try_into().unwrap())
    }
}

fn set_common_header(data: &mut [u8], kind: PageKind, size: u16, max_size: u16) {
    data[PAGE_TYPE_OFFSET] = kind.as_byte();
    data[SIZE_OFFSET..SIZE_OFFSET + 2].copy_from_slice(&size.to_le_bytes());
    data[MAX_SIZE_OFFSET..MAX_SIZE_OFFSET + 2].copy_from_slice(&max_size.to_le_bytes());
}

fn set_size(data: &mut [u8], size: u16) {
    data[SIZE_OFFSET..SIZE_OFFSET + 2].copy_from_slice(&size.to_le_bytes());
}

/// The header page: a singleton holding `root_page_id`. Its own `page_id` is
/// fixed at construction time (`HEADER_PAGE_ID`) and never stored in this
/// kind of page, unlike internal/leaf pages.
pub struct HeaderPage<'a> {
    data: &'a [u8],
}

impl<'a> HeaderPage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn root_page_id(&self) -> Option<PageId> {
        read_optional_page_id(self.data, ROOT_PAGE_ID_OFFSET)
    }
}

pub struct HeaderPageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> HeaderPageMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self) {
        self.data.fill(0);
        set_common_header(self.data, PageKind::Header, 0, 0);
        write_optional_page_id(self.data, ROOT_PAGE_ID_OFFSET, None);
    }

    pub fn root_page_id(&self) -> Option<PageId> {
        read_optional_page_id(self.data, ROOT_PAGE_ID_OFFSET)
    }

    pub fn set_root_page_id(&mut self, page_id: Option<PageId>) {
        write_optional_page_id(self.data, ROOT_PAGE_ID_OFFSET, page_id);
    }
}

/// A (key, child_page_id) entry. For index 0 in an internal page's entry
/// list, `key` is the unused pivot placeholder [`DUMMY_KEY`].
pub type InternalEntry = (IndexKey, PageId);

pub struct InternalPage<'a> {
    data: &'a [u8],
}

impl<'a> InternalPage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        debug_assert_eq!(BTreePageView::new(data).page_kind(), PageKind::Internal);
        Self { data }
    }

    pub fn size(&self) -> usize {
        BTreePageView::new(self.data).size() as usize
    }

    pub fn max_size(&self) -> usize {
        BTreePageView::new(self.data).max_size() as usize
    }

    pub fn entry(&self, index: usize) -> InternalEntry {
        let offset = INTERNAL_ENTRIES_OFFSET + index * INTERNAL_ENTRY_SIZE;
        let key = IndexKey::from_bytes(&self.data[offset..offset + INDEX_KEY_SIZE]);
        let child = read_page_id(self.data, offset + INDEX_KEY_SIZE);
        (key, child)
    }

    pub fn entries(&self) -> Vec<InternalEntry> {
        (0..self.size()).map(|i| self.entry(i)).collect()
    }

    /// Index `i` of the child to descend into for `key`, such that
    /// `entries[i].key <= key < entries[i+1].key`, with `entries[0]`'s key
    /// treated as negative infinity.
    pub fn child_index(&self, key: IndexKey, cmp: &dyn KeyComparator) -> usize {
        let key_bytes = key.to_bytes();
        let mut lo = 1usize;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(&self.entry(mid).0.to_bytes(), &key_bytes) == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo - 1
    }
}

pub struct InternalPageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> InternalPageMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self, max_size: u16) {
        self.data.fill(0);
        set_common_header(self.data, PageKind::Internal, 0, max_size);
    }

    pub fn as_ref(&self) -> InternalPage<'_> {
        InternalPage::new(self.data)
    }

    pub fn size(&self) -> usize {
        self.as_ref().size()
    }

    pub fn max_size(&self) -> usize {
        self.as_ref().max_size()
    }

    pub fn entries(&self) -> Vec<InternalEntry> {
        self.as_ref().entries()
    }

    /// Overwrites the entry list wholesale. `entries.len()` becomes the new
    /// `size` and must not exceed the page's physical capacity (callers are
    /// responsible for splitting before this would overflow `max_size`).
    pub fn set_entries(&mut self, entries: &[InternalEntry]) {
        let capacity = (PAGE_SIZE - INTERNAL_ENTRIES_OFFSET) / INTERNAL_ENTRY_SIZE;
        assert!(entries.len() <= capacity, "internal page entry list exceeds physical capacity");
        set_size(self.data, entries.len() as u16);
        for (i, (key, child)) in entries.iter().enumerate() {
            let offset = INTERNAL_ENTRIES_OFFSET + i * INTERNAL_ENTRY_SIZE;
            self.data[offset..offset + INDEX_KEY_SIZE].copy_from_slice(&key.to_bytes());
            write_page_id(self.data, offset + INDEX_KEY_SIZE, *child);
        }
    }
}

pub type LeafEntry = (IndexKey, RecordId);

pub struct LeafPage<'a> {
    data: &'a [u8],
}

impl<'a> LeafPage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        debug_assert_eq!(BTreePageView::new(data).page_kind(), PageKind::Leaf);
        Self { data }
    }

    pub fn size(&self) -> usize {
        BTreePageView::new(self.data).size() as usize
    }

    pub fn max_size(&self) -> usize {
        BTreePageView::new(self.data).max_size() as usize
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        read_optional_page_id(self.data, NEXT_PAGE_ID_OFFSET)
    }

    pub fn entry(&self, index: usize) -> LeafEntry {
        let offset = LEAF_ENTRIES_OFFSET + index * LEAF_ENTRY_SIZE;
        let key = IndexKey::from_bytes(&self.data[offset..offset + INDEX_KEY_SIZE]);
        let value_offset = offset + INDEX_KEY_SIZE;
        let page_id = read_page_id(self.data, value_offset);
        let slot_id = u16::from_le_bytes(self.data[value_offset + 4..value_offset + 6].try_into().unwrap());
        (key, RecordId::new(page_id, SlotId::new(slot_id)))
    }

    pub fn entries(&self) -> Vec<LeafEntry> {
        (0..self.size()).map(|i| self.entry(i)).collect()
    }

    /// Lowest index `i` with `entries[i].key >= key` (insertion point /
    /// lower-bound; `i == size()` if all keys are smaller).
    pub fn lower_bound(&self, key: IndexKey, cmp: &dyn KeyComparator) -> usize {
        let key_bytes = key.to_bytes();
        let mut lo = 0usize;
        let mut hi = self.size();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(&self.entry(mid).0.to_bytes(), &key_bytes) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }
}

pub struct LeafPageMut<'a> {
    data: &'a mut [u8],
}

impl<'a> LeafPageMut<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        Self { data }
    }

    pub fn init(&mut self, max_size: u16) {
        self.data.fill(0);
        set_common_header(self.data, PageKind::Leaf, 0, max_size);
        write_optional_page_id(self.data, NEXT_PAGE_ID_OFFSET, None);
    }

    pub fn as_ref(&self) -> LeafPage<'_> {
        LeafPage::new(self.data)
    }

    pub fn size(&self) -> usize {
        self.as_ref().size()
    }

    pub fn max_size(&self) -> usize {
        self.as_ref().max_size()
    }

    pub fn next_page_id(&self) -> Option<PageId> {
        self.as_ref().next_page_id()
    }

    pub fn set_next_page_id(&mut self, page_id: Option<PageId>) {
        write_optional_page_id(self.data, NEXT_PAGE_ID_OFFSET, page_id);
    }

    pub fn entries(&self) -> Vec<LeafEntry> {
        self.as_ref().entries()
    }

    pub fn set_entries(&mut self, entries: &[LeafEntry]) {
        let capacity = (PAGE_SIZE - LEAF_ENTRIES_OFFSET) / LEAF_ENTRY_SIZE;
        assert!(entries.len() <= capacity, "leaf page entry list exceeds physical capacity");
        set_size(self.data, entries.len() as u16);
        for (i, (key, value)) in entries.iter().enumerate() {
            let offset = LEAF_ENTRIES_OFFSET + i * LEAF_ENTRY_SIZE;
            self.data[offset..offset + INDEX_KEY_SIZE].copy_from_slice(&key.to_bytes());
            let value_offset = offset + INDEX_KEY_SIZE;
            write_page_id(self.data, value_offset, value.page_id);
            self.data[value_offset + 4..value_offset + 6].copy_from_slice(&value.slot_id.as_u16().to_le_bytes());
        }
    }
}
