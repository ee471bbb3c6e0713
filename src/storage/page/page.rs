//! Page - the 4KB unit of storage every index node lives in.

use crate::common::config::PAGE_SIZE;

use super::page_header::{PageHeader, PageType};

/// A page of data (4KB, 4KB-aligned).
///
/// The raw bytes the buffer pool caches and the disk manager persists. Index
/// nodes are decoded from and encoded into a `Page`; nothing reinterprets
/// the bytes in place.
///
/// `Page` does not implement `Clone` outside tests; copying 4KB should be
/// explicit.
///
/// # Example
/// ```
/// use secidx::storage::page::{Page, PageType};
///
/// let mut page = Page::new();
/// page.as_mut_slice()[100] = 0xFF;
/// page.seal(PageType::BTreeLeaf);
/// assert!(page.verify_checksum());
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Stamp `page_type` into the header and recompute the checksum.
    ///
    /// Call this after the body of the page has been fully written.
    pub fn seal(&mut self, page_type: PageType) {
        PageHeader::new(page_type).write_to(&mut self.data);
        let checksum = PageHeader::compute_checksum(&self.data);
        PageHeader {
            page_type,
            checksum,
        }
        .write_to(&mut self.data);
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}
