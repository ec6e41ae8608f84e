use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::FrameHeader;

/// Callback invoked exactly once when a guard releases its pin.
/// Arguments are the page ID and whether the guard dirtied the page.
pub(crate) type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

/// RAII guard holding a pin on a buffer frame.
///
/// Dropping the guard unpins the page through the release callback, folding
/// the guard-local dirty bit into the frame's flag. Moving the guard
/// transfers ownership; the moved-from value no longer releases anything.
/// Data access latches the frame only for the duration of each call.
pub struct BasicPageGuard {
    /// The page ID being guarded
    page_id: PageId,
    /// The frame holding the page (kept alive for the guard's lifetime)
    frame: Arc<FrameHeader>,
    /// Callback to release the pin; taken on drop
    release_callback: Option<ReleaseCallback>,
    /// Whether this guard modified the page
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(page_id: PageId, frame: Arc<FrameHeader>, release_callback: ReleaseCallback) -> Self {
        Self {
            page_id,
            frame,
            release_callback: Some(release_callback),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Marks the page as modified without going through data_mut.
    pub fn set_dirty(&mut self) {
        self.is_dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    /// Read access to the page bytes. Holds the frame's read latch for the
    /// lifetime of the returned guard.
    pub fn data(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.frame.read_data()
    }

    /// Write access to the page bytes; marks the guard dirty. Holds the
    /// frame's write latch for the lifetime of the returned guard.
    pub fn data_mut(&mut self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.is_dirty = true;
        self.frame.write_data()
    }

    /// Drops this guard, releasing the pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        if let Some(callback) = self.release_callback.take() {
            callback(self.page_id, self.is_dirty);
        }
    }
}

/// RAII guard for read access to a page. Holds the frame's read latch for
/// its whole lifetime in addition to the pin; the latch is released before
/// the pin on drop.
pub struct ReadPageGuard {
    base: BasicPageGuard,
    /// Held read latch on the page data. Dropped before `base`.
    data_guard: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    pub(crate) fn new(base: BasicPageGuard) -> Self {
        let data_guard = base.frame.read_data();
        // Safety: the latch guard borrows from the frame, which the base
        // guard keeps alive via Arc for at least as long as this guard.
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(data_guard) };

        Self {
            base,
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().expect("latch held until drop")[..]
    }

    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the latch before the pin goes away
        self.data_guard.take();
    }
}

/// RAII guard for exclusive access to a page. Holds the frame's write latch
/// for its whole lifetime in addition to the pin; the latch is released
/// before the pin on drop.
pub struct WritePageGuard {
    base: BasicPageGuard,
    /// Held write latch on the page data. Dropped before `base`.
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    pub(crate) fn new(base: BasicPageGuard) -> Self {
        let data_guard = base.frame.write_data();
        // Safety: as for ReadPageGuard; the Arc in `base` outlives the latch.
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(data_guard) };

        Self {
            base,
            data_guard: Some(data_guard),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().expect("latch held until drop")[..]
    }

    /// Mutable access to the page bytes; marks the guard dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.base.is_dirty = true;
        &mut self.data_guard.as_mut().expect("latch held until drop")[..]
    }

    pub fn set_dirty(&mut self) {
        self.base.set_dirty();
    }

    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Release the latch before the pin goes away
        self.data_guard.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FrameId;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    fn counting_callback(
        releases: &Arc<AtomicU32>,
        dirty: &Arc<AtomicBool>,
    ) -> ReleaseCallback {
        let releases = Arc::clone(releases);
        let dirty = Arc::clone(dirty);
        Box::new(move |_, is_dirty| {
            releases.fetch_add(1, Ordering::SeqCst);
            dirty.store(is_dirty, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_basic_guard_releases_once() {
        let frame = Arc::new(FrameHeader::new(FrameId::new(0)));
        let releases = Arc::new(AtomicU32::new(0));
        let dirty = Arc::new(AtomicBool::new(false));

        let guard = BasicPageGuard::new(
            PageId::new(1),
            frame,
            counting_callback(&releases, &dirty),
        );

        assert_eq!(guard.page_id(), PageId::new(1));
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        drop(guard);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(!dirty.load(Ordering::SeqCst));
    }

    #[test]
    fn test_basic_guard_move_transfers_ownership() {
        let frame = Arc::new(FrameHeader::new(FrameId::new(0)));
        let releases = Arc::new(AtomicU32::new(0));
        let dirty = Arc::new(AtomicBool::new(false));

        let guard = BasicPageGuard::new(
            PageId::new(1),
            frame,
            counting_callback(&releases, &dirty),
        );

        let sink = guard;
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        drop(sink);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_basic_guard_dirty_propagates() {
        let frame = Arc::new(FrameHeader::new(FrameId::new(0)));
        let releases = Arc::new(AtomicU32::new(0));
        let dirty = Arc::new(AtomicBool::new(false));

        let mut guard = BasicPageGuard::new(
            PageId::new(1),
            Arc::clone(&frame),
            counting_callback(&releases, &dirty),
        );

        guard.data_mut()[0] = 42;
        drop(guard);

        assert!(dirty.load(Ordering::SeqCst));
        let mut out = [0u8; PAGE_SIZE];
        frame.copy_to(&mut out);
        assert_eq!(out[0], 42);
    }

    #[test]
    fn test_write_guard_latch_released_before_unpin() {
        let frame = Arc::new(FrameHeader::new(FrameId::new(0)));
        let releases = Arc::new(AtomicU32::new(0));
        let dirty = Arc::new(AtomicBool::new(false));

        let frame_for_cb = Arc::clone(&frame);
        let releases_cb = Arc::clone(&releases);
        let dirty_cb = Arc::clone(&dirty);
        let callback: ReleaseCallback = Box::new(move |_, is_dirty| {
            // The write latch must already be free when the pin is released.
            assert!(frame_for_cb.data.try_read().is_some());
            releases_cb.fetch_add(1, Ordering::SeqCst);
            dirty_cb.store(is_dirty, Ordering::SeqCst);
        });

        let base = BasicPageGuard::new(PageId::new(1), Arc::clone(&frame), callback);
        let mut guard = WritePageGuard::new(base);

        guard.data_mut()[0] = 7;
        assert!(frame.data.try_read().is_none());

        drop(guard);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(dirty.load(Ordering::SeqCst));
        assert!(frame.data.try_write().is_some());
    }

    #[test]
    fn test_read_guards_shared() {
        let frame = Arc::new(FrameHeader::new(FrameId::new(0)));
        let releases = Arc::new(AtomicU32::new(0));
        let dirty = Arc::new(AtomicBool::new(false));

        let g1 = ReadPageGuard::new(BasicPageGuard::new(
            PageId::new(1),
            Arc::clone(&frame),
            counting_callback(&releases, &dirty),
        ));
        let g2 = ReadPageGuard::new(BasicPageGuard::new(
            PageId::new(1),
            Arc::clone(&frame),
            counting_callback(&releases, &dirty),
        ));

        assert_eq!(g1.data()[0], g2.data()[0]);
        assert!(frame.data.try_write().is_none());

        drop(g1);
        drop(g2);
        assert_eq!(releases.load(Ordering::SeqCst), 2);
        assert!(frame.data.try_write().is_some());
    }
}
