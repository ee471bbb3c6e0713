//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashMap, VecDeque};

use crate::common::FrameId;

/// Evicts frames in the order they were first loaded, skipping pinned ones.
///
/// `tracked` maps each queued frame to its evictable flag; a frame is in
/// `queue` iff it is a key of `tracked`.
#[derive(Default)]
pub struct FifoReplacer {
    queue: VecDeque<FrameId>,
    tracked: HashMap<FrameId, bool>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a frame. Re-access does not reorder it.
    pub fn record_access(&mut self, frame_id: FrameId) {
        if !self.tracked.contains_key(&frame_id) {
            self.tracked.insert(frame_id, false);
            self.queue.push_back(frame_id);
        }
    }

    /// Flip whether a tracked frame may be chosen as a victim.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if let Some(flag) = self.tracked.get_mut(&frame_id) {
            *flag = evictable;
        }
    }

    /// Oldest evictable frame, or `None` if every tracked frame is pinned.
    pub fn evict(&mut self) -> Option<FrameId> {
        let position = self
            .queue
            .iter()
            .position(|fid| self.tracked.get(fid).copied().unwrap_or(false))?;
        let victim = self.queue.remove(position)?;
        self.tracked.remove(&victim);
        Some(victim)
    }
}
