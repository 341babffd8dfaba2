use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, RecordId, Result};

use super::btree_page::LeafPage;
use super::index_key::IndexKey;

/// Forward iterator over a B+Tree's leaf chain. Holds only a page id and
/// slot index between calls to `next`; each call re-acquires a short-lived
/// read guard on the current leaf rather than holding one across caller
/// code, so it never contends with concurrent inserts/removes on pages it
/// has already passed.
pub struct BTreeIterator {
    bpm: Arc<BufferPoolManager>,
    current_page_id: Option<PageId>,
    current_index: usize,
    end_key: Option<IndexKey>,
    done: bool,
}

impl BTreeIterator {
    pub fn new(bpm: Arc<BufferPoolManager>, start_page_id: PageId, start_index: usize, end_key: Option<IndexKey>) -> Self {
        Self {
            bpm,
            current_page_id: Some(start_page_id),
            current_index: start_index,
            end_key,
            done: false,
        }
    }

    pub fn next(&mut self) -> Result<Option<(IndexKey, RecordId)>> {
        if self.done {
            return Ok(None);
        }

        while let Some(page_id) = self.current_page_id {
            let next_page = {
                let guard = self.bpm.fetch_page_read(page_id)?;
                let leaf = LeafPage::new(guard.data());

                if self.current_index < leaf.size() {
                    let (key, value) = leaf.entry(self.current_index);

                    if let Some(end_key) = self.end_key {
                        if key > end_key {
                            self.done = true;
                            return Ok(None);
                        }
                    }

                    self.current_index += 1;
                    return Ok(Some((key, value)));
                }

                leaf.next_page_id()
            };

            self.current_page_id = next_page;
            self.current_index = 0;
        }

        self.done = true;
        Ok(None)
    }
}

impl Iterator for BTreeIterator {
    type Item = Result<(IndexKey, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match BTreeIterator::next(self) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

