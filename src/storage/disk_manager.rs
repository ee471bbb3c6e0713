//! Disk Manager - page-granular I/O on one index file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single index file.
///
/// # File Layout
/// ```text
/// ┌──────────┬─────────┬─────────┬─────────┐
/// │ Page 0   │ Page 1  │  ...    │ Page N  │
/// │ (header) │ (root)  │         │         │
/// └──────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096    ...    N×4096
/// ```
///
/// # Durability
/// Page writes and allocations go to the OS without `fsync()`. The buffer
/// pool calls [`DiskManager::sync`] once when the index is flushed, so a
/// bulk build does not pay one fsync per page.
pub struct DiskManager {
    file: File,
    path: PathBuf,
    /// Number of pages in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new index file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_count: 0,
        })
    }

    /// Open an existing index file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;

        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            page_count,
        })
    }

    /// Whether an index file already exists at `path`.
    pub fn exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.check_allocated(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a previously allocated page.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_allocated(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        self.file.write_all(page.as_slice())?;

        Ok(())
    }

    /// Extend the file by one zeroed page and return its id.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = PageId::new(self.page_count);
        if !page_id.is_valid() {
            return Err(Error::InvalidConfig(format!(
                "index file {} reached the page limit",
                self.path.display()
            )));
        }

        self.file.seek(SeekFrom::Start(Self::offset_of(page_id)))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Force all written pages to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the number of pages in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    fn check_allocated(&self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        Ok(())
    }

    #[inline]
    fn offset_of(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }
}
