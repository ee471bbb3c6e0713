//! secidx - A disk-resident B+Tree secondary index over a paged relation.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                             secidx                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 Index Layer (index/)                     │   │
//! │  │   BTreeIndex: open/bulk load → insert_entry → scans      │   │
//! │  │   Nodes: IndexMeta | InternalNode | LeafNode             │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │               Buffer Pool (buffer/)                      │   │
//! │  │   BufferPoolManager + Frame + FIFO replacer + Stats      │   │
//! │  │   RAII page guards, explicit pin/unpin for scan cursors  │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │               Storage Layer (storage/)                   │   │
//! │  │        DiskManager + Page + PageHeader (CRC32)           │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, RecordId, Error, config)
//! - [`buffer`] - Buffer pool management and eviction
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - The B+Tree index
//! - [`relation`] - Base-relation scans used to build an index
//!
//! # Quick Start
//! ```no_run
//! use secidx::{BTreeIndex, Datatype, IndexConfig, Operator, RecordId};
//!
//! // Records carry their key as a little-endian i32 at byte offset 4.
//! let records = (1..=1000u32).map(|i| {
//!     let mut rec = vec![0u8; 4];
//!     rec.extend_from_slice(&(i as i32 * 10).to_le_bytes());
//!     (RecordId::new(i, 0), rec)
//! });
//!
//! let mut index = BTreeIndex::open("data", "items", 4, Datatype::Integer, records, IndexConfig::default())?;
//!
//! index.start_scan(100, Operator::Gte, 200, Operator::Lt)?;
//! while let Ok(rid) = index.scan_next() {
//!     println!("{}", rid);
//! }
//! index.close()?;
//! # Ok::<(), secidx::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod relation;
pub mod storage;

pub use common::config::{IndexConfig, PAGE_SIZE};
pub use common::{Error, FrameId, PageId, RecordId, Result};

pub use buffer::StatsSnapshot;
pub use index::btree::{BTreeIndex, Datatype, Operator};
pub use relation::RelationScan;
