//! Error types for the index and the storage layer beneath it.

use thiserror::Error;

use crate::common::RecordId;

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Every error the crate can surface.
///
/// Scan-protocol errors (`BadOpcodes` through `IndexScanCompleted`) are
/// expected conditions a caller matches on to detect invalid input or
/// exhaustion. `Corrupt` means a page violated a structural invariant and the
/// index must not be used further.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist on disk.
    #[error("Page {0} not found")]
    PageNotFound(u32),

    /// Every frame in the buffer pool is pinned.
    #[error("No free frames available in buffer pool")]
    NoFreeFrames,

    /// Unpin of a page that is not resident or has pin count 0.
    ///
    /// This indicates a bug - unpinning should match pinning.
    #[error("Page {0} is not pinned")]
    PageNotPinned(u32),

    /// Scan bounds must be `GT`/`GTE` below and `LT`/`LTE` above.
    #[error("bad scan operators: low bound must be GT or GTE, high bound LT or LTE")]
    BadOpcodes,

    /// Low bound of a scan is greater than its high bound.
    #[error("bad scan range: low {low} is greater than high {high}")]
    BadScanRange { low: i32, high: i32 },

    /// No entry satisfies the scan range.
    #[error("no key in the index satisfies the scan range")]
    NoSuchKeyFound,

    /// `scan_next` or `end_scan` called with no scan in progress.
    #[error("no index scan is in progress")]
    ScanNotInitialized,

    /// The active scan has returned every qualifying entry.
    #[error("index scan completed")]
    IndexScanCompleted,

    /// The header page of an existing index does not describe the
    /// requested relation attribute, or the requested attribute is invalid.
    #[error("bad index info: {0}")]
    BadIndexInfo(String),

    /// A record id with page number 0 collides with the unused-slot sentinel.
    #[error("invalid record id {0}")]
    InvalidRecordId(RecordId),

    /// A base-relation record is too short to hold the indexed attribute.
    #[error("record {rid} is too short for a key at byte offset {offset}")]
    RecordTooShort { rid: RecordId, offset: usize },

    /// A page violated a structural invariant of the tree.
    #[error("corrupt page {page_id}: {reason}")]
    Corrupt { page_id: u32, reason: String },

    /// Rejected [`IndexConfig`](crate::common::config::IndexConfig).
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Build a [`Error::Corrupt`] for `page_id`.
    pub(crate) fn corrupt(page_id: crate::common::PageId, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            page_id: page_id.0,
            reason: reason.into(),
        }
    }

    /// Whether this error means the on-disk tree is structurally broken.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Corrupt { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PageId;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(42);
        assert_eq!(format!("{}", err), "Page 42 not found");

        let err = Error::BadScanRange { low: 10, high: 5 };
        assert_eq!(
            format!("{}", err),
            "bad scan range: low 10 is greater than high 5"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        assert!(matches!(err, Error::Io(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_structural_classification() {
        assert!(Error::corrupt(PageId::new(3), "gap in used prefix").is_structural());
        assert!(!Error::NoSuchKeyFound.is_structural());
        assert!(!Error::IndexScanCompleted.is_structural());
    }
}
