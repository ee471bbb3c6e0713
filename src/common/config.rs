//! Configuration constants and index tuning knobs.

use crate::common::{Error, Result};
use crate::index::btree::{INTERNAL_CAPACITY, LEAF_CAPACITY};

/// Size of a page in bytes (4KB).
///
/// Every index node occupies exactly one page, so this value fixes the
/// maximum leaf and internal fan-out.
pub const PAGE_SIZE: usize = 4096;

/// Deepest root-to-leaf path the navigator will follow before declaring the
/// tree corrupt. With the minimum fan-out of 2 this still addresses 2^32
/// leaves.
pub const MAX_TREE_HEIGHT: usize = 32;

/// Default number of frames in the index's buffer pool.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Smallest pool that can hold a root-to-leaf descent plus a split.
pub const MIN_POOL_SIZE: usize = 4;

/// Knobs for building or opening a [`BTreeIndex`](crate::BTreeIndex).
///
/// Capacities only matter when the index file is created; an existing index
/// keeps the fan-out recorded in its header page.
///
/// # Example
/// ```
/// use secidx::IndexConfig;
///
/// let config = IndexConfig::default().with_leaf_capacity(8).with_pool_size(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// Maximum entries per leaf (*M*).
    pub leaf_capacity: usize,
    /// Maximum separator keys per internal node (*N*).
    pub internal_capacity: usize,
}

impl IndexConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_leaf_capacity(mut self, leaf_capacity: usize) -> Self {
        self.leaf_capacity = leaf_capacity;
        self
    }

    pub fn with_internal_capacity(mut self, internal_capacity: usize) -> Self {
        self.internal_capacity = internal_capacity;
        self
    }

    /// Check every knob against its page-derived bounds.
    ///
    /// # Errors
    /// `Error::InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size < MIN_POOL_SIZE {
            return Err(Error::InvalidConfig(format!(
                "pool_size {} is below the minimum of {}",
                self.pool_size, MIN_POOL_SIZE
            )));
        }
        if !(2..=LEAF_CAPACITY).contains(&self.leaf_capacity) {
            return Err(Error::InvalidConfig(format!(
                "leaf_capacity {} must be within 2..={}",
                self.leaf_capacity, LEAF_CAPACITY
            )));
        }
        if !(2..=INTERNAL_CAPACITY).contains(&self.internal_capacity) {
            return Err(Error::InvalidConfig(format!(
                "internal_capacity {} must be within 2..={}",
                self.internal_capacity, INTERNAL_CAPACITY
            )));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            leaf_capacity: LEAF_CAPACITY,
            internal_capacity: INTERNAL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = IndexConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.leaf_capacity, LEAF_CAPACITY);
        assert_eq!(config.internal_capacity, INTERNAL_CAPACITY);
    }

    #[test]
    fn test_config_rejects_out_of_range_values() {
        let base = IndexConfig::default();

        assert!(matches!(
            base.with_pool_size(1).validate(),
            Err(Error::InvalidConfig(_))
        ));
        assert!(base.with_leaf_capacity(1).validate().is_err());
        assert!(base.with_leaf_capacity(LEAF_CAPACITY + 1).validate().is_err());
        assert!(base.with_internal_capacity(1).validate().is_err());
        assert!(base
            .with_internal_capacity(INTERNAL_CAPACITY + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_accepts_minimal_fanout() {
        let config = IndexConfig::default()
            .with_pool_size(MIN_POOL_SIZE)
            .with_leaf_capacity(2)
            .with_internal_capacity(2);
        assert!(config.validate().is_ok());
    }
}
