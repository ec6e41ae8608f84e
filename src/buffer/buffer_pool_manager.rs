use std::collections::{HashMap, LinkedList};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::common::{AccessType, FrameId, PageId, QuarryError, Result, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Bookkeeping state guarded by the pool-wide lock.
struct PoolInner {
    /// Page table: maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no live page
    free_list: LinkedList<FrameId>,
    /// Monotonic page ID allocator
    next_page_id: i32,
}

/// State shared between the manager and the guards it hands out.
struct BufferPoolState {
    /// The buffer pool frames
    frames: Vec<Arc<FrameHeader>>,
    /// Page table, free list, and page ID allocator
    inner: Mutex<PoolInner>,
    /// LRU-K replacer for eviction decisions. Pool-driven updates happen
    /// while the pool lock is held (lock order: pool lock, then replacer).
    replacer: LruKReplacer,
}

impl BufferPoolState {
    /// Releases one pin on a page, folding the guard's dirty bit into the
    /// frame flag. A page whose pin count reaches zero becomes evictable.
    /// Returns false for non-resident pages and pages that are not pinned.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        frame.or_dirty(is_dirty);

        match frame.unpin() {
            None => false,
            Some(0) => {
                self.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
        }
    }
}

/// BufferPoolManager provides the illusion of unlimited paged memory over a
/// fixed set of frames. It tracks pins and dirty state, consults the LRU-K
/// replacer for eviction, and writes dirty victims back before reuse.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state, also captured by page guard release callbacks
    state: Arc<BufferPoolState>,
    /// Disk scheduler for page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size, k value for
    /// the LRU-K replacer, and disk manager.
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(BufferPoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
                next_page_id: 0,
            }),
            replacer: LruKReplacer::new(k, pool_size),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and pins it into a frame (pin count 1).
    /// The caller is responsible for unpinning, either directly or by using
    /// new_page_guarded. Fails with BufferPoolFull when the free list is
    /// empty and nothing is evictable.
    pub fn new_page(&self) -> Result<PageId> {
        let mut inner = self.state.inner.lock();

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let page_id = PageId::new(inner.next_page_id);
        inner.next_page_id += 1;

        frame.set_page_id(page_id);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        self.state.replacer.record_access(frame_id, AccessType::Unknown);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(page_id)
    }

    /// Allocates a fresh page and wraps it in a basic guard.
    pub fn new_page_guarded(&self) -> Result<BasicPageGuard> {
        let page_id = self.new_page()?;
        Ok(self.wrap_basic(page_id))
    }

    /// Fetches a page and returns a basic (unlatched) guard holding a pin.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        self.fetch_page(page_id)?;
        Ok(self.wrap_basic(page_id))
    }

    /// Fetches a page and returns a guard holding a pin and the read latch.
    /// The latch is taken after the fetch completes, never under the pool lock.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        self.fetch_page(page_id)?;
        Ok(ReadPageGuard::new(self.wrap_basic(page_id)))
    }

    /// Fetches a page and returns a guard holding a pin and the write latch.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        self.fetch_page(page_id)?;
        Ok(WritePageGuard::new(self.wrap_basic(page_id)))
    }

    /// Releases one pin on a page. The dirty flag is ORed into the frame's.
    /// Returns false if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin_page(page_id, is_dirty)
    }

    /// Writes a page's current contents to disk and clears its dirty flag.
    /// Returns Ok(false) if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let inner = self.state.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        frame.clear_dirty();

        Ok(true)
    }

    /// Flushes every dirty resident page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let inner = self.state.inner.lock();

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = &self.state.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let mut data = [0u8; PAGE_SIZE];
                frame.copy_to(&mut data);
                self.disk_scheduler.schedule_write_sync(page_id, &data)?;
                frame.clear_dirty();
            }
        }

        Ok(())
    }

    /// Removes a page from the buffer pool, returning its frame to the free
    /// list. Succeeds vacuously for non-resident pages; fails for pinned
    /// pages. Dirty contents are discarded, not written back.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.state.inner.lock();

        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.state.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            warn!("refusing to delete pinned page {}", page_id);
            return Err(QuarryError::PageStillPinned(page_id));
        }

        inner.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        Ok(true)
    }

    /// Returns the pin count of a resident page.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Pins the page into a frame, reading it from disk on a miss.
    /// The whole operation happens under the pool lock.
    fn fetch_page(&self, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let mut inner = self.state.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id, AccessType::Unknown);
            self.state.replacer.set_evictable(frame_id, false);
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.state.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.disk_scheduler.schedule_read_sync(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.clear_dirty();
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        self.state.replacer.record_access(frame_id, AccessType::Unknown);
        self.state.replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    /// Obtains a clean frame: from the free list if possible, otherwise by
    /// evicting a victim (writing it back first if dirty).
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.reset();
            return Ok(frame_id);
        }

        let Some(frame_id) = self.state.replacer.evict() else {
            return Err(QuarryError::BufferPoolFull);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            debug!("evicting dirty page {}, writing back", old_page_id);
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(old_page_id, &data)?;
        }

        inner.page_table.remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }

    fn wrap_basic(&self, page_id: PageId) -> BasicPageGuard {
        let inner = self.state.inner.lock();
        let frame_id = inner.page_table[&page_id];
        let frame = Arc::clone(&self.state.frames[frame_id.as_usize()]);
        drop(inner);

        let state = Arc::clone(&self.state);
        BasicPageGuard::new(
            page_id,
            frame,
            Box::new(move |pid, is_dirty| {
                state.unpin_page(pid, is_dirty);
            }),
        )
    }
}
