//! Buffer pool counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the buffer pool with `Ordering::Relaxed`.
///
/// Each counter is independent; a [`StatsSnapshot`] is only as consistent as
/// the moment each load happened to run.
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    /// Fetches served from a resident frame.
    pub cache_hits: AtomicU64,
    /// Fetches that had to read the page from disk.
    pub cache_misses: AtomicU64,
    /// Frames reclaimed from a resident page.
    pub evictions: AtomicU64,
    /// Pages read from disk.
    pub pages_read: AtomicU64,
    /// Dirty pages written back to disk.
    pub pages_written: AtomicU64,
    /// Pages newly allocated in the file.
    pub pages_allocated: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy every counter into a plain value.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`BufferPoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_allocated: u64,
}

impl StatsSnapshot {
    /// Fraction of fetches served from memory (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Total page fetches, hits plus misses.
    pub fn fetches(&self) -> u64 {
        self.cache_hits + self.cache_misses
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, allocated: {}, written: {}, hit_rate: {:.2}% }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_allocated,
            self.pages_written,
            self.hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_hit_rate() {
        let stats = BufferPoolStats::new();
        assert_eq!(stats.snapshot().hit_rate(), 0.0);

        for _ in 0..7 {
            BufferPoolStats::bump(&stats.cache_hits);
        }
        for _ in 0..3 {
            BufferPoolStats::bump(&stats.cache_misses);
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.cache_hits, 7);
        assert_eq!(snapshot.fetches(), 10);
        assert_eq!(snapshot.hit_rate(), 0.7);
    }

    #[test]
    fn test_display() {
        let snapshot = StatsSnapshot {
            cache_hits: 80,
            cache_misses: 20,
            evictions: 5,
            pages_allocated: 12,
            ..StatsSnapshot::default()
        };
        let display = format!("{}", snapshot);

        assert!(display.contains("hits: 80"));
        assert!(display.contains("allocated: 12"));
        assert!(display.contains("80.00%"));
    }
}
