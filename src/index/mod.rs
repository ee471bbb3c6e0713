//! Index structures.
//!
//! - [`btree`] - Disk-resident B+Tree secondary index over an integer attribute

pub mod btree;
