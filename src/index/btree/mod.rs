//! Disk-resident B+Tree secondary index.
//!
//! Maps an `i32` attribute of a base relation to the [`RecordId`]s of the
//! records holding it. One index lives in one file: page 0 is the header
//! ([`IndexMeta`]), every other page is an internal or leaf [`Node`].
//!
//! # Components
//! - [`node`] - Page formats and the used-prefix checks run on decode
//! - [`BTreeIndex`] - Lifecycle, navigation and diagnostics
//! - insertion with split propagation up an explicit ancestor stack
//! - range scans driven by a single [`Operator`]-bounded cursor
//!
//! [`RecordId`]: crate::common::RecordId

mod index;
mod insert;
pub mod node;
mod scan;

pub use index::BTreeIndex;
pub use node::{
    Datatype, IndexMeta, InternalNode, LeafNode, Node, PageKeyPair, INTERNAL_CAPACITY,
    LEAF_CAPACITY, MAX_RELATION_NAME_LEN,
};
pub use scan::Operator;
