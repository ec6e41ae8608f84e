use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// A buffer frame: one PAGE_SIZE slot of the pool plus its bookkeeping.
///
/// Metadata transitions (which page is resident, the pin count) are
/// serialized by the pool lock; the fields are atomics only so that
/// introspection such as pin-count queries and the flush scan can read them
/// without taking the data latch.
///
/// The dirty flag is the single record of unwritten changes. Guards OR
/// their local verdict into it when their pin is released (`or_dirty`), and
/// only the write-back paths clear it (`clear_dirty`). Nothing else touches
/// the flag, so "dirty" always means exactly "frame bytes differ from disk".
pub struct FrameHeader {
    /// The frame ID (index in the buffer pool)
    frame_id: FrameId,
    /// Resident page, or the invalid sentinel when the frame is free.
    /// Stored as the raw i32 so the sentinel round-trips through the atomic.
    page_id: AtomicI32,
    /// Number of outstanding references to this frame
    pin_count: AtomicU32,
    /// Whether the frame bytes differ from the on-disk page
    is_dirty: AtomicBool,
    /// Page bytes behind the per-frame reader-writer latch. Guards latch
    /// this directly; the pool never holds it across an operation.
    pub(crate) data: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl FrameHeader {
    /// Creates an empty frame for the given slot.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicI32::new(INVALID_PAGE_ID.as_i32()),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            data: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_i32(), Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Takes one pin and returns the new count.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops one pin and returns the new count, or None if the frame was
    /// not pinned. Pin transitions happen under the pool lock, so the
    /// check-then-decrement cannot race with another unpin.
    pub fn unpin(&self) -> Option<u32> {
        let current = self.pin_count.load(Ordering::Acquire);
        if current == 0 {
            return None;
        }
        self.pin_count.store(current - 1, Ordering::Release);
        Some(current - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Accumulates a guard's dirty verdict. The flag only moves upward
    /// here; a clean guard cannot hide an earlier guard's write.
    pub fn or_dirty(&self, dirty: bool) {
        if dirty {
            self.is_dirty.store(true, Ordering::Release);
        }
    }

    /// Marks the frame as matching the on-disk page. Called by the
    /// write-back paths (flush, eviction) once the bytes have reached disk,
    /// and after a fresh read fills the frame.
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Returns a read guard to the page data.
    pub fn read_data(&self) -> parking_lot::RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.read()
    }

    /// Returns a write guard to the page data.
    pub fn write_data(&self) -> parking_lot::RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.data.write()
    }

    /// Fills the frame from a disk-sized buffer.
    pub fn copy_from(&self, data: &[u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        self.data.write().copy_from_slice(data);
    }

    /// Snapshots the frame into a disk-sized buffer.
    pub fn copy_to(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        data.copy_from_slice(&**self.data.read());
    }

    /// Returns the frame to its empty state: no page, no pins, clean,
    /// zeroed bytes.
    pub fn reset(&self) {
        self.page_id.store(INVALID_PAGE_ID.as_i32(), Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.data.write().fill(0);
    }
}
