use std::cmp::Ordering;
use std::sync::Arc;

use log::trace;

use crate::buffer::{BufferPoolManager, ReadPageGuard, WritePageGuard};
use crate::common::{PageId, RecordId, Result};

use super::btree_iterator::BTreeIterator;
use super::btree_page::{
    BTreePageView, HeaderPage, HeaderPageMut, InternalEntry, InternalPage, InternalPageMut, LeafEntry, LeafPage,
    LeafPageMut, PageKind, DUMMY_KEY,
};
use super::index_key::IndexKey;
use super::key_comparator::{KeyComparator, TwoIntComparator};

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

/// Crabbing-style concurrent B+Tree over `(IndexKey, RecordId)` pairs with
/// unique keys. A dedicated header page holds `root_page_id`; the tree is
/// empty iff that field is unset. Readers and writers couple latches
/// page-by-page during descent, releasing ancestors as soon as the current
/// node is provably safe for the operation in flight.
pub struct BTreeIndex {
    bpm: Arc<BufferPoolManager>,
    header_page_id: PageId,
    comparator: Arc<dyn KeyComparator>,
    leaf_max_size: u16,
    internal_max_size: u16,
}

impl BTreeIndex {
    /// Creates a brand-new, empty index with a freshly allocated header page.
    pub fn new(bpm: Arc<BufferPoolManager>, leaf_max_size: u16, internal_max_size: u16) -> Result<Self> {
        let mut header_guard = bpm.new_page_guarded()?.upgrade_write();
        let header_page_id = header_guard.page_id();
        HeaderPageMut::new(header_guard.data_mut()).init();
        drop(header_guard);

        Ok(Self {
            bpm,
            header_page_id,
            comparator: Arc::new(TwoIntComparator),
            leaf_max_size,
            internal_max_size,
        })
    }

    /// Reattaches to an index whose header page already exists on disk.
    pub fn open(bpm: Arc<BufferPoolManager>, header_page_id: PageId, leaf_max_size: u16, internal_max_size: u16) -> Self {
        Self {
            bpm,
            header_page_id,
            comparator: Arc::new(TwoIntComparator),
            leaf_max_size,
            internal_max_size,
        }
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn root_page_id(&self) -> Result<Option<PageId>> {
        let guard = self.bpm.fetch_page_read(self.header_page_id)?;
        Ok(HeaderPage::new(guard.data()).root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.root_page_id()?.is_none())
    }

    fn leaf_min_size(&self) -> usize {
        ceil_div(self.leaf_max_size as usize - 1, 2)
    }

    fn internal_min_size(&self) -> usize {
        ceil_div(self.internal_max_size as usize, 2)
    }

    /// Descends with reader-crabbing to the leaf that would contain `key`.
    /// Returns `None` if the tree is empty.
    fn find_leaf_read(&self, key: IndexKey) -> Result<Option<ReadPageGuard>> {
        let header_guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let Some(root_id) = HeaderPage::new(header_guard.data()).root_page_id() else {
            return Ok(None);
        };
        let mut current = self.bpm.fetch_page_read(root_id)?;
        drop(header_guard);

        loop {
            match BTreePageView::new(current.data()).page_kind() {
                PageKind::Leaf => return Ok(Some(current)),
                PageKind::Internal => {
                    let internal = InternalPage::new(current.data());
                    let child_id = internal.entry(internal.child_index(key, &*self.comparator)).1;
                    current = self.bpm.fetch_page_read(child_id)?;
                }
                PageKind::Header => unreachable!("header page cannot appear below the root"),
            }
        }
    }

    pub fn get_value(&self, key: IndexKey) -> Result<Option<RecordId>> {
        let Some(leaf_guard) = self.find_leaf_read(key)? else {
            return Ok(None);
        };
        let leaf = LeafPage::new(leaf_guard.data());
        let idx = leaf.lower_bound(key, &*self.comparator);
        if idx < leaf.size() && leaf.entry(idx).0 == key {
            Ok(Some(leaf.entry(idx).1))
        } else {
            Ok(None)
        }
    }

    /// Inserts `(key, value)`. Returns `false` without modifying the tree if
    /// `key` is already present.
    pub fn insert(&self, key: IndexKey, value: RecordId) -> Result<bool> {
        let header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_id = HeaderPage::new(header_guard.data()).root_page_id();

        let Some(root_id) = root_id else {
            let mut header_guard = header_guard;
            let mut leaf_guard = self.bpm.new_page_guarded()?.upgrade_write();
            {
                let mut leaf = LeafPageMut::new(leaf_guard.data_mut());
                leaf.init(self.leaf_max_size);
                leaf.set_entries(&[(key, value)]);
            }
            HeaderPageMut::new(header_guard.data_mut()).set_root_page_id(Some(leaf_guard.page_id()));
            trace!("created root leaf {} for first insert", leaf_guard.page_id());
            return Ok(true);
        };

        let old_root_id = root_id;
        let mut ancestors: Vec<WritePageGuard> = vec![header_guard];
        let mut current_id = root_id;

        loop {
            let current_guard = self.bpm.fetch_page_write(current_id)?;
            match BTreePageView::new(current_guard.data()).page_kind() {
                PageKind::Leaf => {
                    if LeafPage::new(current_guard.data()).size() < self.leaf_max_size as usize {
                        ancestors.clear();
                    }
                    ancestors.push(current_guard);
                    break;
                }
                PageKind::Internal => {
                    let internal = InternalPage::new(current_guard.data());
                    if internal.size() < self.internal_max_size as usize {
                        ancestors.clear();
                    }
                    let child_id = internal.entry(internal.child_index(key, &*self.comparator)).1;
                    ancestors.push(current_guard);
                    current_id = child_id;
                }
                PageKind::Header => unreachable!(),
            }
        }

        let mut leaf_guard = ancestors.pop().expect("descent always visits at least the leaf");
        let leaf_ref = LeafPage::new(leaf_guard.data());
        let idx = leaf_ref.lower_bound(key, &*self.comparator);
        if idx < leaf_ref.size() && leaf_ref.entry(idx).0 == key {
            return Ok(false);
        }

        let mut entries = leaf_ref.entries();
        entries.insert(idx, (key, value));

        let mut propagate: Option<(IndexKey, PageId)> = None;
        if entries.len() <= self.leaf_max_size as usize {
            LeafPageMut::new(leaf_guard.data_mut()).set_entries(&entries);
        } else {
            let mid = entries.len() / 2;
            let left: Vec<LeafEntry> = entries[..mid].to_vec();
            let right: Vec<LeafEntry> = entries[mid..].to_vec();
            let separator = right[0].0;

            let mut new_leaf_guard = self.bpm.new_page_guarded()?.upgrade_write();
            let old_next = LeafPage::new(leaf_guard.data()).next_page_id();
            {
                let mut new_leaf = LeafPageMut::new(new_leaf_guard.data_mut());
                new_leaf.init(self.leaf_max_size);
                new_leaf.set_entries(&right);
                new_leaf.set_next_page_id(old_next);
            }
            {
                let mut old_leaf = LeafPageMut::new(leaf_guard.data_mut());
                old_leaf.set_entries(&left);
                old_leaf.set_next_page_id(Some(new_leaf_guard.page_id()));
            }
            trace!("split leaf {} -> {} at separator {}", leaf_guard.page_id(), new_leaf_guard.page_id(), separator);
            propagate = Some((separator, new_leaf_guard.page_id()));
        }
        drop(leaf_guard);

        while let Some((sep_key, new_child_id)) = propagate.take() {
            let mut guard = ancestors.pop().expect("propagation must terminate at the header");
            match BTreePageView::new(guard.data()).page_kind() {
                PageKind::Header => {
                    let mut new_root_guard = self.bpm.new_page_guarded()?.upgrade_write();
                    {
                        let mut internal = InternalPageMut::new(new_root_guard.data_mut());
                        internal.init(self.internal_max_size);
                        internal.set_entries(&[(DUMMY_KEY, old_root_id), (sep_key, new_child_id)]);
                    }
                    HeaderPageMut::new(guard.data_mut()).set_root_page_id(Some(new_root_guard.page_id()));
                    trace!("new root {} after split propagation", new_root_guard.page_id());
                }
                PageKind::Internal => {
                    let mut entries = InternalPage::new(guard.data()).entries();
                    let sep_bytes = sep_key.to_bytes();
                    let pos = entries[1..]
                        .iter()
                        .position(|(k, _)| self.comparator.compare(&k.to_bytes(), &sep_bytes) == Ordering::Greater)
                        .map(|p| p + 1)
                        .unwrap_or(entries.len());
                    entries.insert(pos, (sep_key, new_child_id));

                    if entries.len() <= self.internal_max_size as usize {
                        InternalPageMut::new(guard.data_mut()).set_entries(&entries);
                    } else {
                        let mid = entries.len() / 2;
                        let left: Vec<InternalEntry> = entries[..mid].to_vec();
                        let mut right: Vec<InternalEntry> = entries[mid..].to_vec();
                        let separator = right[0].0;
                        right[0].0 = DUMMY_KEY;

                        let mut new_internal_guard = self.bpm.new_page_guarded()?.upgrade_write();
                        {
                            let mut new_internal = InternalPageMut::new(new_internal_guard.data_mut());
                            new_internal.init(self.internal_max_size);
                            new_internal.set_entries(&right);
                        }
                        InternalPageMut::new(guard.data_mut()).set_entries(&left);
                        propagate = Some((separator, new_internal_guard.page_id()));
                    }
                }
                PageKind::Leaf => unreachable!("leaf cannot receive upward propagation"),
            }
        }

        Ok(true)
    }

    /// Removes `key` if present; a no-op otherwise.
    pub fn remove(&self, key: IndexKey) -> Result<()> {
        let header_guard = self.bpm.fetch_page_write(self.header_page_id)?;
        let Some(root_id) = HeaderPage::new(header_guard.data()).root_page_id() else {
            return Ok(());
        };

        let mut ancestors: Vec<WritePageGuard> = vec![header_guard];
        let mut current_id = root_id;

        loop {
            let current_guard = self.bpm.fetch_page_write(current_id)?;
            match BTreePageView::new(current_guard.data()).page_kind() {
                PageKind::Leaf => {
                    if LeafPage::new(current_guard.data()).size() > self.leaf_min_size() {
                        ancestors.clear();
                    }
                    ancestors.push(current_guard);
                    break;
                }
                PageKind::Internal => {
                    let internal = InternalPage::new(current_guard.data());
                    if internal.size() > self.internal_min_size() {
                        ancestors.clear();
                    }
                    let child_id = internal.entry(internal.child_index(key, &*self.comparator)).1;
                    ancestors.push(current_guard);
                    current_id = child_id;
                }
                PageKind::Header => unreachable!(),
            }
        }

        let mut leaf_guard = ancestors.pop().expect("descent always visits at least the leaf");
        {
            let leaf_ref = LeafPage::new(leaf_guard.data());
            let idx = leaf_ref.lower_bound(key, &*self.comparator);
            if idx >= leaf_ref.size() || leaf_ref.entry(idx).0 != key {
                return Ok(());
            }
            let mut entries = leaf_ref.entries();
            entries.remove(idx);
            LeafPageMut::new(leaf_guard.data_mut()).set_entries(&entries);
        }

        // Root-is-leaf special case: underflow below the configured minimum
        // is tolerated for the root, only total emptiness collapses the tree.
        if ancestors.len() == 1 {
            let mut header_guard = ancestors.pop().unwrap();
            if LeafPage::new(leaf_guard.data()).size() == 0 {
                HeaderPageMut::new(header_guard.data_mut()).set_root_page_id(None);
                let leaf_page_id = leaf_guard.page_id();
                drop(leaf_guard);
                self.bpm.delete_page(leaf_page_id)?;
            }
            return Ok(());
        }

        let mut child_guard = leaf_guard;
        loop {
            let child_is_leaf = BTreePageView::new(child_guard.data()).page_kind() == PageKind::Leaf;
            let child_size = BTreePageView::new(child_guard.data()).size() as usize;
            let min_size = if child_is_leaf { self.leaf_min_size() } else { self.internal_min_size() };

            if child_size >= min_size {
                return Ok(());
            }

            if ancestors.len() == 1 {
                let mut header_guard = ancestors.pop().unwrap();
                if !child_is_leaf {
                    let entries = InternalPage::new(child_guard.data()).entries();
                    if entries.len() == 1 {
                        let sole_child = entries[0].1;
                        HeaderPageMut::new(header_guard.data_mut()).set_root_page_id(Some(sole_child));
                        let child_page_id = child_guard.page_id();
                        drop(child_guard);
                        self.bpm.delete_page(child_page_id)?;
                    }
                }
                return Ok(());
            }

            let mut parent_guard = ancestors.pop().expect("non-root node always has a parent");
            let parent_entries = InternalPage::new(parent_guard.data()).entries();
            let child_page_id = child_guard.page_id();
            let my_index = parent_entries
                .iter()
                .position(|(_, pid)| *pid == child_page_id)
                .expect("child must be linked from its parent");

            let left_sibling_id = (my_index > 0).then(|| parent_entries[my_index - 1].1);
            let right_sibling_id = (my_index + 1 < parent_entries.len()).then(|| parent_entries[my_index + 1].1);

            if let Some(left_id) = left_sibling_id {
                let mut left_guard = self.bpm.fetch_page_write(left_id)?;
                if BTreePageView::new(left_guard.data()).size() as usize > min_size {
                    self.borrow_from_left(&mut left_guard, &mut child_guard, &mut parent_guard, my_index, child_is_leaf);
                    return Ok(());
                }
            }

            if let Some(right_id) = right_sibling_id {
                let mut right_guard = self.bpm.fetch_page_write(right_id)?;
                if BTreePageView::new(right_guard.data()).size() as usize > min_size {
                    self.borrow_from_right(&mut child_guard, &mut right_guard, &mut parent_guard, my_index, child_is_leaf);
                    return Ok(());
                }
            }

            if let Some(left_id) = left_sibling_id {
                let mut left_guard = self.bpm.fetch_page_write(left_id)?;
                // `merge_into_left`'s index arg names the *left* operand's own
                // parent slot, not `child`'s: the true left sibling sits one
                // slot before `child` here.
                self.merge_into_left(&mut left_guard, &child_guard, &mut parent_guard, my_index - 1, child_is_leaf);
                let child_page_id = child_guard.page_id();
                drop(child_guard);
                self.bpm.delete_page(child_page_id)?;
            } else {
                let right_id = right_sibling_id.expect("a non-root node without a left sibling has a right one");
                let mut right_guard = self.bpm.fetch_page_write(right_id)?;
                self.merge_into_left(&mut child_guard, &right_guard, &mut parent_guard, my_index, child_is_leaf);
                let right_page_id = right_guard.page_id();
                drop(right_guard);
                self.bpm.delete_page(right_page_id)?;
            }

            child_guard = parent_guard;
        }
    }

    fn borrow_from_left(
        &self,
        left_guard: &mut WritePageGuard,
        child_guard: &mut WritePageGuard,
        parent_guard: &mut WritePageGuard,
        my_index: usize,
        is_leaf: bool,
    ) {
        let mut parent_entries = InternalPage::new(parent_guard.data()).entries();

        if is_leaf {
            let mut left_entries = LeafPage::new(left_guard.data()).entries();
            let moved = left_entries.pop().expect("left sibling had spare entries");
            let mut child_entries = LeafPage::new(child_guard.data()).entries();
            child_entries.insert(0, moved);

            LeafPageMut::new(left_guard.data_mut()).set_entries(&left_entries);
            LeafPageMut::new(child_guard.data_mut()).set_entries(&child_entries);
            parent_entries[my_index].0 = moved.0;
        } else {
            let mut left_entries = InternalPage::new(left_guard.data()).entries();
            let borrowed = left_entries.pop().expect("left sibling had spare entries");
            let child_entries = InternalPage::new(child_guard.data()).entries();

            let mut new_child_entries = vec![(DUMMY_KEY, borrowed.1), (parent_entries[my_index].0, child_entries[0].1)];
            new_child_entries.extend(child_entries[1..].iter().copied());

            InternalPageMut::new(left_guard.data_mut()).set_entries(&left_entries);
            InternalPageMut::new(child_guard.data_mut()).set_entries(&new_child_entries);
            parent_entries[my_index].0 = borrowed.0;
        }

        InternalPageMut::new(parent_guard.data_mut()).set_entries(&parent_entries);
    }

    fn borrow_from_right(
        &self,
        child_guard: &mut WritePageGuard,
        right_guard: &mut WritePageGuard,
        parent_guard: &mut WritePageGuard,
        my_index: usize,
        is_leaf: bool,
    ) {
        let mut parent_entries = InternalPage::new(parent_guard.data()).entries();

        if is_leaf {
            let mut right_entries = LeafPage::new(right_guard.data()).entries();
            let moved = right_entries.remove(0);
            let mut child_entries = LeafPage::new(child_guard.data()).entries();
            child_entries.push(moved);

            LeafPageMut::new(child_guard.data_mut()).set_entries(&child_entries);
            LeafPageMut::new(right_guard.data_mut()).set_entries(&right_entries);
            parent_entries[my_index + 1].0 = right_entries[0].0;
        } else {
            let right_entries = InternalPage::new(right_guard.data()).entries();
            let old_c0 = right_entries[0].1;
            let k1 = right_entries[1].0;

            let mut child_entries = InternalPage::new(child_guard.data()).entries();
            child_entries.push((parent_entries[my_index + 1].0, old_c0));

            let mut new_right_entries = vec![(DUMMY_KEY, right_entries[1].1)];
            new_right_entries.extend(right_entries[2..].iter().copied());

            InternalPageMut::new(child_guard.data_mut()).set_entries(&child_entries);
            InternalPageMut::new(right_guard.data_mut()).set_entries(&new_right_entries);
            parent_entries[my_index + 1].0 = k1;
        }

        InternalPageMut::new(parent_guard.data_mut()).set_entries(&parent_entries);
    }

    /// Merges `right` into `left`, leaving `right` empty and stale (the
    /// caller deletes its page and removes the parent entry that pointed to
    /// it). `my_index` is `left`'s own index among `parent_guard`'s entries,
    /// not `right`'s: the separator/pointer removed is always at
    /// `my_index + 1`.
    fn merge_into_left(
        &self,
        left_guard: &mut WritePageGuard,
        right_guard: &WritePageGuard,
        parent_guard: &mut WritePageGuard,
        my_index: usize,
        is_leaf: bool,
    ) {
        let mut parent_entries = InternalPage::new(parent_guard.data()).entries();

        if is_leaf {
            let mut left_entries = LeafPage::new(left_guard.data()).entries();
            let right_entries = LeafPage::new(right_guard.data()).entries();
            let right_next = LeafPage::new(right_guard.data()).next_page_id();

            left_entries.extend(right_entries);
            let mut left = LeafPageMut::new(left_guard.data_mut());
            left.set_entries(&left_entries);
            left.set_next_page_id(right_next);
        } else {
            let mut left_entries = InternalPage::new(left_guard.data()).entries();
            let right_entries = InternalPage::new(right_guard.data()).entries();
            let pulled_down_key = parent_entries[my_index + 1].0;

            left_entries.push((pulled_down_key, right_entries[0].1));
            left_entries.extend(right_entries[1..].iter().copied());
            InternalPageMut::new(left_guard.data_mut()).set_entries(&left_entries);
        }

        parent_entries.remove(my_index + 1);
        InternalPageMut::new(parent_guard.data_mut()).set_entries(&parent_entries);
    }

    /// Collects every `(key, value)` pair with `start <= key <= end`.
    pub fn range_scan(&self, start: IndexKey, end: IndexKey) -> Result<Vec<(IndexKey, RecordId)>> {
        let Some(leaf_guard) = self.find_leaf_read(start)? else {
            return Ok(Vec::new());
        };
        let leaf = LeafPage::new(leaf_guard.data());
        let start_idx = leaf.lower_bound(start, &*self.comparator);
        let leaf_page_id = leaf_guard.page_id();
        drop(leaf_guard);

        let iter = BTreeIterator::new(self.bpm.clone(), leaf_page_id, start_idx, Some(end));
        iter.collect()
    }

    /// Iterator over the whole tree in key order.
    pub fn iter(&self) -> Result<BTreeIterator> {
        let Some(root_id) = self.root_page_id()? else {
            return Ok(BTreeIterator::new(self.bpm.clone(), self.header_page_id, 0, Some(IndexKey::new(i32::MIN, i32::MIN))));
        };
        let mut current = self.bpm.fetch_page_read(root_id)?;
        loop {
            match BTreePageView::new(current.data()).page_kind() {
                PageKind::Leaf => break,
                PageKind::Internal => {
                    let internal = InternalPage::new(current.data());
                    let child_id = internal.entry(0).1;
                    current = self.bpm.fetch_page_read(child_id)?;
                }
                PageKind::Header => unreachable!(),
            }
        }
        let leaf_page_id = current.page_id();
        drop(current);
        Ok(BTreeIterator::new(self.bpm.clone(), leaf_page_id, 0, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::SlotId;
    use crate::storage::disk::DiskManager;
    use tempfile::NamedTempFile;

    fn make_index(leaf_max: u16, internal_max: u16) -> (BTreeIndex, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let disk_manager = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = Arc::new(BufferPoolManager::new(50, 2, disk_manager));
        let index = BTreeIndex::new(bpm, leaf_max, internal_max).unwrap();
        (index, temp_file)
    }

    fn rid(n: i32) -> RecordId {
        RecordId::new(PageId::new(n), SlotId::new(0))
    }

    #[test]
    fn test_insert_and_get_value_on_empty_tree() {
        let (index, _tmp) = make_index(4, 4);
        assert!(index.is_empty().unwrap());
        assert_eq!(index.get_value(IndexKey::new(1, 0)).unwrap(), None);

        assert!(index.insert(IndexKey::new(1, 0), rid(100)).unwrap());
        assert!(!index.is_empty().unwrap());
        assert_eq!(index.get_value(IndexKey::new(1, 0)).unwrap(), Some(rid(100)));
    }

    #[test]
    fn test_insert_duplicate_key_rejected() {
        let (index, _tmp) = make_index(4, 4);
        assert!(index.insert(IndexKey::new(1, 0), rid(100)).unwrap());
        assert!(!index.insert(IndexKey::new(1, 0), rid(200)).unwrap());
        assert_eq!(index.get_value(IndexKey::new(1, 0)).unwrap(), Some(rid(100)));
    }

    #[test]
    fn test_insert_causing_leaf_split_builds_internal_root() {
        let (index, _tmp) = make_index(4, 4);
        for k in [10, 20, 5, 15, 25] {
            assert!(index.insert(IndexKey::new(k, 0), rid(k)).unwrap());
        }

        assert_eq!(index.get_value(IndexKey::new(15, 0)).unwrap(), Some(rid(15)));
        assert_eq!(index.get_value(IndexKey::new(7, 0)).unwrap(), None);

        let root_id = index.root_page_id().unwrap().unwrap();
        let guard = index.bpm.fetch_page_read(root_id).unwrap();
        assert_eq!(BTreePageView::new(guard.data()).page_kind(), PageKind::Internal);
    }

    #[test]
    fn test_range_scan_returns_sorted_pairs_in_bounds() {
        let (index, _tmp) = make_index(4, 4);
        for k in [30, 10, 20, 40, 50, 5, 15, 25, 35, 45] {
            index.insert(IndexKey::new(k, 0), rid(k)).unwrap();
        }

        let results = index.range_scan(IndexKey::new(15, 0), IndexKey::new(35, 0)).unwrap();
        let keys: Vec<i32> = results.iter().map(|(k, _)| k.a).collect();
        assert_eq!(keys, vec![15, 20, 25, 30, 35]);
    }

    #[test]
    fn test_full_scan_via_iter_visits_every_key_in_order() {
        let (index, _tmp) = make_index(3, 3);
        let keys: Vec<i32> = (0..30).collect();
        for &k in &keys {
            index.insert(IndexKey::new(k, 0), rid(k)).unwrap();
        }

        let collected: Vec<i32> = index.iter().unwrap().map(|r| r.unwrap().0.a).collect();
        assert_eq!(collected, keys);
    }

    #[test]
    fn test_remove_absent_key_is_a_no_op() {
        let (index, _tmp) = make_index(4, 4);
        index.insert(IndexKey::new(1, 0), rid(1)).unwrap();
        index.remove(IndexKey::new(999, 0)).unwrap();
        assert_eq!(index.get_value(IndexKey::new(1, 0)).unwrap(), Some(rid(1)));
    }

    #[test]
    fn test_remove_last_key_empties_tree() {
        let (index, _tmp) = make_index(4, 4);
        index.insert(IndexKey::new(1, 0), rid(1)).unwrap();
        index.remove(IndexKey::new(1, 0)).unwrap();
        assert!(index.is_empty().unwrap());
        assert_eq!(index.get_value(IndexKey::new(1, 0)).unwrap(), None);
    }

    #[test]
    fn test_bulk_insert_then_remove_all_leaves_empty_tree() {
        let (index, _tmp) = make_index(4, 4);
        let keys: Vec<i32> = (0..60).collect();
        for &k in &keys {
            index.insert(IndexKey::new(k, 0), rid(k)).unwrap();
        }
        for &k in &keys {
            index.remove(IndexKey::new(k, 0)).unwrap();
        }

        assert!(index.is_empty().unwrap());
        for &k in &keys {
            assert_eq!(index.get_value(IndexKey::new(k, 0)).unwrap(), None);
        }
    }

    #[test]
    fn test_remove_triggers_merge_and_remaining_keys_still_found() {
        let (index, _tmp) = make_index(4, 4);
        let keys: Vec<i32> = (0..40).collect();
        for &k in &keys {
            index.insert(IndexKey::new(k, 0), rid(k)).unwrap();
        }

        // Remove every other key; this forces several leaf merges/borrows.
        for k in (0..40).step_by(2) {
            index.remove(IndexKey::new(k, 0)).unwrap();
        }

        for k in 0..40 {
            let expected = if k % 2 == 0 { None } else { Some(rid(k)) };
            assert_eq!(index.get_value(IndexKey::new(k, 0)).unwrap(), expected);
        }
    }
}
