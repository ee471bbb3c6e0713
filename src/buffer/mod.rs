//! Buffer pool management.
//!
//! The in-memory cache between the index and its file. A fixed pool of
//! frames each holds one page; the index pins pages while it reads or
//! mutates them.
//!
//! # Components
//! - [`BufferPoolManager`] - The page cache
//! - `Frame` - A slot holding a page and its residency record
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII pins
//! - [`BufferPoolStats`] - Hit/miss/eviction counters
//! - [`replacer`] - Eviction policy

mod buffer_pool_manager;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool_manager::BufferPoolManager;
pub(crate) use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
