//! Common types shared across the crate.
//!
//! - Configuration constants and [`IndexConfig`](config::IndexConfig)
//! - Error types
//! - Identifiers (PageId, FrameId, RecordId)

pub mod config;
pub mod error;
mod ids;

pub use error::{Error, Result};
pub use ids::{FrameId, PageId, RecordId};
