//! Identifier types: pages on disk, frames in the pool, records in the
//! base relation.

use std::fmt;

/// Identifies a page within one index file.
///
/// Page N lives at byte offset `N × PAGE_SIZE`. Page 0 of an index file is
/// always its header page, so no tree node ever has id 0.
///
/// # Example
/// ```
/// use secidx::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert!(!PageId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Sentinel for "no page": the missing right sibling of the last leaf
    /// and the unused child slots of an internal node.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}

/// Identifies a frame in the buffer pool (an index into its frame vector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub usize);

impl FrameId {
    /// Create a new FrameId.
    #[inline]
    pub fn new(id: usize) -> Self {
        FrameId(id)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

/// Location of a tuple in the base relation: page number plus slot.
///
/// Relation page numbers start at 1. A record id with page number 0 is the
/// unused-slot marker inside leaf pages and is never a real record.
///
/// # Layout (8 bytes)
/// ```text
/// Offset  Size  Field
/// 0       4     page_number (LE)
/// 4       2     slot_number (LE)
/// 6       2     zero padding
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RecordId {
    pub page_number: u32,
    pub slot_number: u16,
}

impl RecordId {
    /// Encoded size in bytes.
    pub const SIZE: usize = 8;

    /// The unused-slot marker.
    pub const UNUSED: RecordId = RecordId {
        page_number: 0,
        slot_number: 0,
    };

    #[inline]
    pub fn new(page_number: u32, slot_number: u16) -> Self {
        Self {
            page_number,
            slot_number,
        }
    }

    /// Whether this is a real record location (page number non-zero).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.page_number != 0
    }

    pub fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.page_number.to_le_bytes());
        buf[4..6].copy_from_slice(&self.slot_number.to_le_bytes());
        buf
    }

    /// Decode from the first [`RecordId::SIZE`] bytes of `buf`.
    ///
    /// Returns `None` if the padding bytes are non-zero.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf[6] != 0 || buf[7] != 0 {
            return None;
        }
        Some(Self {
            page_number: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            slot_number: u16::from_le_bytes([buf[4], buf[5]]),
        })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rid({}:{})", self.page_number, self.slot_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_id_invalid() {
        assert!(PageId::new(0).is_valid());
        assert!(!PageId::INVALID.is_valid());
        assert_eq!(PageId::INVALID.0, u32::MAX);
    }

    #[test]
    fn test_page_id_display() {
        assert_eq!(format!("{}", PageId::new(42)), "Page(42)");
        assert_eq!(format!("{}", PageId::INVALID), "Page(INVALID)");
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(format!("{}", FrameId::new(7)), "Frame(7)");
    }

    #[test]
    fn test_record_id_byte_layout() {
        let rid = RecordId::new(0x04030201, 0x0605);
        let bytes = rid.to_bytes();
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0, 0]);
        assert_eq!(RecordId::from_bytes(&bytes), Some(rid));
    }

    #[test]
    fn test_record_id_rejects_dirty_padding() {
        let mut bytes = RecordId::new(1, 1).to_bytes();
        bytes[7] = 0xFF;
        assert_eq!(RecordId::from_bytes(&bytes), None);
    }

    #[test]
    fn test_record_id_unused_marker() {
        assert!(!RecordId::UNUSED.is_valid());
        assert!(!RecordId::default().is_valid());
        assert!(RecordId::new(1, 0).is_valid());
        assert_eq!(format!("{}", RecordId::new(3, 9)), "Rid(3:9)");
    }
}
