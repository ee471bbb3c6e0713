//! Frame - one slot of the buffer pool.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::PageId;
use crate::storage::page::Page;

/// What a frame currently holds, kept under one lock so the pool never sees
/// a page id paired with another page's pin count or dirty bit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Residency {
    page_id: Option<PageId>,
    pins: u32,
    dirty: bool,
}

/// A page buffer plus the residency record the pool keeps for it.
///
/// The page bytes sit behind their own `RwLock` so a guard can hold them
/// while the pool updates pins on other frames.
pub(crate) struct Frame {
    page: RwLock<Page>,
    residency: Mutex<Residency>,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            residency: Mutex::new(Residency::default()),
        }
    }

    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    /// Page held by this frame, `None` while it sits on the free list.
    #[inline]
    pub fn resident_page(&self) -> Option<PageId> {
        self.residency.lock().page_id
    }

    /// Bind the frame to `page_id` with one pin and clean contents.
    pub fn occupy(&self, page_id: PageId) {
        let mut residency = self.residency.lock();
        debug_assert_eq!(residency.pins, 0, "occupying a pinned frame");
        *residency = Residency {
            page_id: Some(page_id),
            pins: 1,
            dirty: false,
        };
    }

    /// Forget the resident page. Called after its bytes reached disk.
    pub fn vacate(&self) {
        *self.residency.lock() = Residency::default();
    }

    /// Add a pin; returns the new count.
    #[inline]
    pub fn pin(&self) -> u32 {
        let mut residency = self.residency.lock();
        residency.pins += 1;
        residency.pins
    }

    /// Drop a pin, folding in whether the holder modified the page.
    /// Returns the pins left.
    ///
    /// # Panics
    /// If the frame is not pinned.
    pub fn release(&self, dirtied: bool) -> u32 {
        let mut residency = self.residency.lock();
        assert!(residency.pins > 0, "frame released more often than pinned");
        residency.pins -= 1;
        residency.dirty |= dirtied;
        residency.pins
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.residency.lock().pins
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.residency.lock().dirty
    }

    /// Record that the on-disk copy matches the buffer again.
    #[inline]
    pub fn mark_clean(&self) {
        self.residency.lock().dirty = false;
    }
}
