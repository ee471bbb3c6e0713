//! Storage layer - the paged index file.
//!
//! - [`DiskManager`] - Page-granular file I/O
//! - [`page`] - Page bytes and header

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;
