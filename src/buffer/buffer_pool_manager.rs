use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;

use crate::common::{FrameId, PageId, RelCoreError, Result, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

struct PoolInner {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// Shared state reachable both from the `BufferPoolManager` handle and from
/// the release callback captured inside every page guard it hands out.
struct PoolState {
    frames: Vec<Arc<FrameHeader>>,
    replacer: LruKReplacer,
    disk_scheduler: DiskScheduler,
    inner: Mutex<PoolInner>,
}

impl PoolState {
    fn unpin_frame(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.as_usize()];
        if is_dirty {
            frame.set_dirty(true);
        }
        if let Some(0) = frame.unpin() {
            self.replacer.set_evictable(frame_id, true);
        }
    }

    fn release_callback(self: &Arc<Self>, frame_id: FrameId) -> Box<dyn FnOnce(PageId, bool) + Send + Sync> {
        let state = Arc::clone(self);
        Box::new(move |_page_id, is_dirty| {
            state.unpin_frame(frame_id, is_dirty);
        })
    }
}

/// Fixed-size cache of page frames, backed by a [`DiskManager`] and evicted
/// according to [`LruKReplacer`]. Page-table and free-list bookkeeping is
/// serialized by a single pool latch (`PoolState::inner`); the replacer has
/// its own internal latch, and disk I/O runs through a background
/// [`DiskScheduler`], so neither latch is ever held across a read or write of
/// the backing file.
pub struct BufferPoolManager {
    pool_size: usize,
    state: Arc<PoolState>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let frames = (0..pool_size)
            .map(|i| Arc::new(FrameHeader::new(FrameId::new(i as u32))))
            .collect();
        let free_list = (0..pool_size).map(|i| FrameId::new(i as u32)).collect();

        Self {
            pool_size,
            state: Arc::new(PoolState {
                frames,
                replacer: LruKReplacer::new(replacer_k, pool_size),
                disk_scheduler: DiskScheduler::new(disk_manager),
                inner: Mutex::new(PoolInner {
                    page_table: HashMap::new(),
                    free_list,
                }),
            }),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    /// Current pin count for a resident page, or `None` if it isn't resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = *self.state.inner.lock().page_table.get(&page_id)?;
        Some(self.state.frames[frame_id.as_usize()].pin_count())
    }

    /// Obtains a free frame, evicting via the replacer if necessary. If the
    /// eviction victim is dirty it is flushed to disk after the pool latch is
    /// released, and the frame is reset before being handed back.
    fn acquire_frame(&self) -> Result<FrameId> {
        let mut inner = self.state.inner.lock();
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.state.replacer.evict().ok_or(RelCoreError::BufferPoolFull)?;
        let frame = self.state.frames[frame_id.as_usize()].clone();
        let old_page_id = frame.page_id();
        inner.page_table.remove(&old_page_id);
        drop(inner);

        if frame.is_dirty() {
            self.flush_frame(&frame, old_page_id)?;
        }
        frame.reset();
        debug!("evicted frame {frame_id} (was page {old_page_id})");
        Ok(frame_id)
    }

    /// Allocates a fresh page id and registers a zeroed, unpinned frame for
    /// it. Callers that need a pin right away should use
    /// [`new_page_guarded`](Self::new_page_guarded) instead.
    pub fn new_page(&self) -> Result<PageId> {
        Ok(self.new_page_guarded()?.page_id())
    }

    /// Allocates a fresh page id, pins its frame, and hands ownership of that
    /// pin to the returned [`BasicPageGuard`].
    pub fn new_page_guarded(&self) -> Result<BasicPageGuard> {
        let frame_id = self.acquire_frame()?;
        let page_id = self.state.disk_scheduler.disk_manager().allocate_page();
        let frame = self.state.frames[frame_id.as_usize()].clone();
        frame.set_page_id(page_id);
        frame.pin();

        self.state.inner.lock().page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);
        trace!("new_page allocated {page_id} in frame {frame_id}");

        Ok(BasicPageGuard::new(page_id, frame, self.state.release_callback(frame_id)))
    }

    fn fetch_frame(&self, page_id: PageId) -> Result<FrameId> {
        let existing = self.state.inner.lock().page_table.get(&page_id).copied();

        let frame_id = match existing {
            Some(frame_id) => {
                self.state.frames[frame_id.as_usize()].pin();
                frame_id
            }
            None => {
                let frame_id = self.acquire_frame()?;
                let frame = self.state.frames[frame_id.as_usize()].clone();
                let mut buf = [0u8; PAGE_SIZE];
                self.state.disk_scheduler.schedule_read_sync(page_id, &mut buf)?;
                frame.copy_from(&buf);
                frame.set_page_id(page_id);
                frame.pin();
                self.state.inner.lock().page_table.insert(page_id, frame_id);
                frame_id
            }
        };

        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);
        Ok(frame_id)
    }

    /// Fetches `page_id`, pinning it, without acquiring a reader or writer
    /// latch on its contents.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        let frame_id = self.fetch_frame(page_id)?;
        let frame = self.state.frames[frame_id.as_usize()].clone();
        Ok(BasicPageGuard::new(page_id, frame, self.state.release_callback(frame_id)))
    }

    /// Fetches `page_id` and acquires its reader latch.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_read())
    }

    /// Fetches `page_id` and acquires its writer latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        Ok(self.fetch_page_basic(page_id)?.upgrade_write())
    }

    /// Raw unpin, for callers not going through a page guard. Returns `false`
    /// if the page isn't resident or its pin count is already zero.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let frame_id = match self.state.inner.lock().page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return false,
        };
        let frame = &self.state.frames[frame_id.as_usize()];
        if is_dirty {
            frame.set_dirty(true);
        }
        match frame.unpin() {
            Some(0) => {
                self.state.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    fn flush_frame(&self, frame: &Arc<FrameHeader>, page_id: PageId) -> Result<()> {
        let mut buf = [0u8; PAGE_SIZE];
        frame.copy_to(&mut buf);
        self.state.disk_scheduler.schedule_write_sync(page_id, &buf)?;
        frame.set_dirty(false);
        Ok(())
    }

    /// Writes a resident page's frame to disk and clears its dirty bit.
    /// Does not unpin. Returns `false` if the page isn't resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let frame = {
            let inner = self.state.inner.lock();
            match inner.page_table.get(&page_id) {
                Some(&frame_id) => self.state.frames[frame_id.as_usize()].clone(),
                None => return Ok(false),
            }
        };
        self.flush_frame(&frame, page_id)?;
        Ok(true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let page_ids: Vec<PageId> = self.state.inner.lock().page_table.keys().copied().collect();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Deletes a resident page, failing if it is still pinned. Flushes it
    /// first if dirty, then returns the frame to the free list and tells the
    /// disk manager the page id is free.
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.state.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = self.state.frames[frame_id.as_usize()].clone();
            if frame.pin_count() > 0 {
                return Err(RelCoreError::PageStillPinned(page_id));
            }
            let was_dirty = frame.is_dirty();
            inner.page_table.remove(&page_id);
            drop(inner);

            if was_dirty {
                self.flush_frame(&frame, page_id)?;
            }
            self.state.replacer.remove(frame_id);
            frame.reset();

            inner = self.state.inner.lock();
            inner.free_list.push_back(frame_id);
        }
        drop(inner);
        self.state.disk_scheduler.disk_manager().deallocate_page(page_id);
        Ok(())
    }
}
