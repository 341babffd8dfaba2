use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use parking_lot::Mutex;

use crate::common::FrameId;

/// Bookkeeping for a single tracked frame.
struct FrameRecord {
    access_count: usize,
    is_evictable: bool,
}

/// Two intrusive, ordered lists of tracked frames: frames with fewer than k
/// accesses (`history`), and frames with at least k (`cache`). Each list is
/// MRU-at-front, LRU-at-back.
struct ReplacerState {
    records: HashMap<FrameId, FrameRecord>,
    history: VecDeque<FrameId>,
    cache: VecDeque<FrameId>,
    evictable_count: usize,
}

impl ReplacerState {
    fn move_to_front(list: &mut VecDeque<FrameId>, frame_id: FrameId) {
        if let Some(pos) = list.iter().position(|&f| f == frame_id) {
            list.remove(pos);
        }
        list.push_front(frame_id);
    }

    fn remove_from(list: &mut VecDeque<FrameId>, frame_id: FrameId) {
        if let Some(pos) = list.iter().position(|&f| f == frame_id) {
            list.remove(pos);
        }
    }

    fn evict_from_back(list: &VecDeque<FrameId>, records: &HashMap<FrameId, FrameRecord>) -> Option<FrameId> {
        list.iter()
            .rev()
            .find(|&&f| records.get(&f).is_some_and(|r| r.is_evictable))
            .copied()
    }
}

/// Tracks per-frame access history and chooses eviction victims using the
/// LRU-K policy: prefer a frame with fewer than k accesses (infinite
/// backward k-distance) over one with k or more, and within each group
/// prefer the one whose relevant access is oldest.
pub struct LruKReplacer {
    k: usize,
    max_frames: usize,
    current_timestamp: AtomicU64,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    pub fn new(k: usize, max_frames: usize) -> Self {
        Self {
            k,
            max_frames,
            current_timestamp: AtomicU64::new(0),
            state: Mutex::new(ReplacerState {
                records: HashMap::new(),
                history: VecDeque::new(),
                cache: VecDeque::new(),
                evictable_count: 0,
            }),
        }
    }

    fn next_timestamp(&self) -> u64 {
        self.current_timestamp.fetch_add(1, Ordering::Relaxed)
    }

    /// Records an access to `frame_id`, creating tracking state for it if
    /// this is the first time it's been seen. Newly created entries are not
    /// evictable until `set_evictable` says otherwise.
    pub fn record_access(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_usize() < self.max_frames,
            "frame id {frame_id} out of range for replacer of size {}",
            self.max_frames
        );

        let _ = self.next_timestamp();
        let mut state = self.state.lock();

        let promoted_to_cache = {
            let record = state.records.entry(frame_id).or_insert_with(|| FrameRecord {
                access_count: 0,
                is_evictable: false,
            });
            record.access_count += 1;
            record.access_count == self.k
        };

        let count = state.records[&frame_id].access_count;
        if count < self.k {
            ReplacerState::move_to_front(&mut state.history, frame_id);
        } else if promoted_to_cache {
            ReplacerState::remove_from(&mut state.history, frame_id);
            state.cache.push_front(frame_id);
        } else {
            ReplacerState::move_to_front(&mut state.cache, frame_id);
        }
    }

    /// Toggles whether `frame_id` is a candidate for eviction. Unknown
    /// frames are silently ignored.
    pub fn set_evictable(&self, frame_id: FrameId, evictable: bool) {
        let mut state = self.state.lock();
        let Some(record) = state.records.get_mut(&frame_id) else {
            return;
        };
        if record.is_evictable == evictable {
            return;
        }
        record.is_evictable = evictable;
        if evictable {
            state.evictable_count += 1;
        } else {
            state.evictable_count -= 1;
        }
    }

    /// Removes all state for `frame_id` regardless of its evictability.
    /// Used when a frame is reused for a different page outside the normal
    /// evict path (e.g. the BPM deleting a page).
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        let Some(record) = state.records.remove(&frame_id) else {
            return;
        };
        if record.is_evictable {
            state.evictable_count -= 1;
        }
        ReplacerState::remove_from(&mut state.history, frame_id);
        ReplacerState::remove_from(&mut state.cache, frame_id);
    }

    /// Picks a victim: the LRU end of the history list if it holds any
    /// evictable frame (infinite backward distance beats any finite one),
    /// otherwise the LRU end of the cache list. Returns `None` if no frame
    /// is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        let victim = ReplacerState::evict_from_back(&state.history, &state.records)
            .or_else(|| ReplacerState::evict_from_back(&state.cache, &state.records))?;

        ReplacerState::remove_from(&mut state.history, victim);
        ReplacerState::remove_from(&mut state.cache, victim);
        state.records.remove(&victim);
        state.evictable_count -= 1;
        debug!("lru-k evicted frame {victim}");
        Some(victim)
    }

    /// Number of frames currently marked evictable.
    pub fn size(&self) -> usize {
        self.state.lock().evictable_count
    }

    pub fn k(&self) -> usize {
        self.k
    }
}
