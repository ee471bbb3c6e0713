//! Eviction policy for the buffer pool.
//!
//! Index workloads touch the root and upper internal nodes on every
//! operation; those pages are re-pinned constantly and so rarely sit
//! unpinned at the front of the queue.

mod fifo;

pub use fifo::FifoReplacer;
