use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{PageId, Result, PAGE_SIZE};

/// Reads and writes fixed-size pages to a single backing file.
///
/// Table-heap-specific layout (segmented files, extent allocation) belongs to
/// the disk format for table heaps, which is out of scope here; this manager
/// only needs to hand the B+Tree and buffer pool a flat, page-addressable
/// file.
pub struct DiskManager {
    file: Mutex<File>,
    /// Next page id to hand out from `allocate_page`.
    next_page_id: AtomicI32,
    num_reads: AtomicU64,
    num_writes: AtomicU64,
}

impl DiskManager {
    /// Opens (or creates) the database file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let num_pages = (file.metadata()?.len() / PAGE_SIZE as u64) as i32;

        Ok(Self {
            file: Mutex::new(file),
            next_page_id: AtomicI32::new(num_pages),
            num_reads: AtomicU64::new(0),
            num_writes: AtomicU64::new(0),
        })
    }

    /// Allocates and returns a fresh, monotonically increasing page id.
    /// Does not touch the file until the page is actually written.
    pub fn allocate_page(&self) -> PageId {
        let id = self.next_page_id.fetch_add(1, Ordering::AcqRel);
        PageId::new(id)
    }

    /// Marks a page id as free. This core never reclaims page-id space or
    /// shrinks the file; it exists so the BPM's `delete_page` has somewhere
    /// to report deallocation, matching the collaborator contract in the
    /// external interfaces.
    pub fn deallocate_page(&self, _page_id: PageId) {}

    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let mut file = self.file.lock();
        let offset = page_id.as_i32() as u64 * PAGE_SIZE as u64;
        if offset + PAGE_SIZE as u64 > file.metadata()?.len() {
            // Never-written page: defined as all zeroes.
            data.fill(0);
            return Ok(());
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(data)?;
        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE);
        let mut file = self.file.lock();
        let offset = page_id.as_i32() as u64 * PAGE_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn num_reads(&self) -> u64 {
        self.num_reads.load(Ordering::Relaxed)
    }

    pub fn num_writes(&self) -> u64 {
        self.num_writes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_disk_manager_allocate_is_monotonic() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        let p0 = dm.allocate_page();
        let p1 = dm.allocate_page();
        let p2 = dm.allocate_page();

        assert_eq!(p0.as_i32(), 0);
        assert_eq!(p1.as_i32(), 1);
        assert_eq!(p2.as_i32(), 2);
    }

    #[test]
    fn test_disk_manager_read_write_roundtrip() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        let page_id = dm.allocate_page();
        let mut write_data = [0u8; PAGE_SIZE];
        write_data[0] = 42;
        write_data[PAGE_SIZE - 1] = 7;
        dm.write_page(page_id, &write_data).unwrap();

        let mut read_data = [0u8; PAGE_SIZE];
        dm.read_page(page_id, &mut read_data).unwrap();

        assert_eq!(read_data[0], 42);
        assert_eq!(read_data[PAGE_SIZE - 1], 7);
        assert_eq!(dm.num_reads(), 1);
        assert_eq!(dm.num_writes(), 1);
    }

    #[test]
    fn test_disk_manager_unwritten_page_reads_zero() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = DiskManager::new(temp_file.path()).unwrap();

        let page_id = dm.allocate_page();
        let mut data = [0xFFu8; PAGE_SIZE];
        dm.read_page(page_id, &mut data).unwrap();

        assert!(data.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_disk_manager_reopen_resumes_allocation() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_path_buf();

        {
            let dm = DiskManager::new(&path).unwrap();
            for _ in 0..5 {
                let pid = dm.allocate_page();
                dm.write_page(pid, &[1u8; PAGE_SIZE]).unwrap();
            }
        }

        let dm = DiskManager::new(&path).unwrap();
        let pid = dm.allocate_page();
        assert_eq!(pid.as_i32(), 5);
    }
}
