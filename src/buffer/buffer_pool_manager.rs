//! Buffer Pool Manager - the page cache every index operation goes through.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between the index file and memory
//! - Pin-based reference counting (guards, or an explicit pin/unpin pair)
//! - Write-back of dirty pages on eviction and flush

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{Error, FrameId, PageId, Result};
use crate::storage::DiskManager;

/// Manages a fixed pool of frames caching pages of one index file.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────┐  ┌───────────────────────────────────┐   │
/// │  │ page_table   │  │        frames: Vec<Frame>         │   │
/// │  │PageId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │   │
/// │  └──────────────┘  └───────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
/// │  │  free_list   │  │   replacer   │  │disk_manager  │      │
/// │  │ Vec<FrameId> │  │ FifoReplacer │  │   Mutex      │      │
/// │  └──────────────┘  └──────────────┘  └──────────────┘      │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Pinning
/// A page is pinned while a [`PageReadGuard`]/[`PageWriteGuard`] is alive.
/// State that must keep a page resident across calls (a scan cursor) pairs
/// [`pin_page`](Self::pin_page) with [`unpin_page`](Self::unpin_page)
/// instead. Pinned frames are never evicted, so a leaked pin permanently
/// shrinks the pool.
pub struct BufferPoolManager {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps page IDs to frame IDs.
    page_table: RwLock<HashMap<PageId, FrameId>>,

    /// Stack of free frame IDs.
    free_list: Mutex<Vec<FrameId>>,

    replacer: Mutex<FifoReplacer>,

    disk_manager: Mutex<DiskManager>,

    stats: BufferPoolStats,
}

impl BufferPoolManager {
    /// Create a new buffer pool manager.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(FifoReplacer::new()),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Pin a page and return shared access to it.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Pin a page and return exclusive access to it.
    ///
    /// # Errors
    /// Same as [`fetch_page_read`](Self::fetch_page_read).
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Allocate a new zeroed page in the file and return it pinned.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - I/O errors from disk allocation
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.get_free_frame()?;

        let page_id = match self.disk_manager.lock().allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        BufferPoolStats::bump(&self.stats.pages_allocated);

        let frame = &self.frames[frame_id.0];
        frame.page_mut().reset();
        self.install(frame_id, page_id);

        Ok(PageWriteGuard::new(self, frame_id, page_id, frame.page_mut()))
    }

    // ========================================================================
    // Public API: Explicit pin / unpin
    // ========================================================================

    /// Pin a page without taking a guard.
    ///
    /// Every successful call must be balanced by exactly one
    /// [`unpin_page`](Self::unpin_page).
    pub fn pin_page(&self, page_id: PageId) -> Result<()> {
        self.fetch_page_internal(page_id).map(|_| ())
    }

    /// Release one pin taken with [`pin_page`](Self::pin_page).
    ///
    /// # Errors
    /// `Error::PageNotPinned` if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<()> {
        let frame_id = self
            .page_table
            .read()
            .get(&page_id)
            .copied()
            .ok_or(Error::PageNotPinned(page_id.0))?;

        if !self.frames[frame_id.0].is_pinned() {
            return Err(Error::PageNotPinned(page_id.0));
        }

        self.unpin_page_internal(frame_id, is_dirty);
        Ok(())
    }

    // ========================================================================
    // Public API: Flush
    // ========================================================================

    /// Write every dirty resident page back and sync the file.
    ///
    /// # Errors
    /// - I/O errors from disk writes
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<(PageId, FrameId)> = {
            let pt = self.page_table.read();
            pt.iter().map(|(&pid, &fid)| (pid, fid)).collect()
        };

        for (page_id, frame_id) in pages {
            self.flush_frame(frame_id, page_id)?;
        }

        self.disk_manager.lock().sync()
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Pin count of a resident page, `None` if it is not in the pool.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let frame_id = *self.page_table.read().get(&page_id)?;
        Some(self.frames[frame_id.0].pin_count())
    }

    /// Number of frames with a non-zero pin count.
    pub fn pinned_frame_count(&self) -> usize {
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    /// Number of pages in the underlying file.
    pub fn disk_page_count(&self) -> u32 {
        self.disk_manager.lock().page_count()
    }

    // ========================================================================
    // Internal: Called by PageGuard on drop
    // ========================================================================

    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        if self.frames[frame_id.0].release(is_dirty) == 0 {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, page_id: PageId) -> Result<FrameId> {
        let resident = self.page_table.read().get(&page_id).copied();
        if let Some(frame_id) = resident {
            self.frames[frame_id.0].pin();
            self.replacer.lock().set_evictable(frame_id, false);
            BufferPoolStats::bump(&self.stats.cache_hits);
            return Ok(frame_id);
        }

        self.handle_cache_miss(page_id)
    }

    fn handle_cache_miss(&self, page_id: PageId) -> Result<FrameId> {
        BufferPoolStats::bump(&self.stats.cache_misses);

        let frame_id = self.get_free_frame()?;

        let page_data = match self.disk_manager.lock().read_page(page_id) {
            Ok(page) => page,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        BufferPoolStats::bump(&self.stats.pages_read);

        let frame = &self.frames[frame_id.0];
        frame
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page_data.as_slice());
        self.install(frame_id, page_id);

        Ok(frame_id)
    }

    /// Bind a prepared frame to `page_id` with pin count 1.
    fn install(&self, frame_id: FrameId, page_id: PageId) {
        self.frames[frame_id.0].occupy(page_id);

        self.page_table.write().insert(page_id, frame_id);

        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    fn get_free_frame(&self) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page()
    }

    fn evict_page(&self) -> Result<FrameId> {
        let frame_id = self.replacer.lock().evict().ok_or(Error::NoFreeFrames)?;
        BufferPoolStats::bump(&self.stats.evictions);

        let frame = &self.frames[frame_id.0];
        if let Some(old_page_id) = frame.resident_page() {
            trace!(page = old_page_id.0, frame = frame_id.0, dirty = frame.is_dirty(), "evicting page");
            if let Err(e) = self.flush_frame(frame_id, old_page_id) {
                // Keep the page resident so its unwritten bytes are not lost.
                self.replacer.lock().record_access(frame_id);
                self.replacer.lock().set_evictable(frame_id, true);
                return Err(e);
            }
            self.page_table.write().remove(&old_page_id);
        }

        frame.vacate();

        Ok(frame_id)
    }

    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            let page = frame.page();
            self.disk_manager.lock().write_page(page_id, &page)?;
            drop(page);

            frame.mark_clean();
            BufferPoolStats::bump(&self.stats.pages_written);
        }

        Ok(())
    }
}
