//! Range scans over the leaf chain.
//!
//! A scan moves Idle → Active in [`BTreeIndex::start_scan`] and back to Idle
//! through [`BTreeIndex::end_scan`] or exhaustion. While Active, exactly one
//! leaf (the cursor leaf) stays pinned across calls.

use tracing::trace;

use crate::common::{Error, PageId, RecordId, Result};

use super::index::{BTreeIndex, Descent};
use super::node::{LeafNode, Node};

/// Comparison applied to one end of a scan range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Lt,
    Lte,
    Gte,
    Gt,
}

impl Operator {
    /// Whether this operator may bound the low end of a range.
    #[inline]
    pub fn is_lower_bound(self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte)
    }

    /// Whether this operator may bound the high end of a range.
    #[inline]
    pub fn is_upper_bound(self) -> bool {
        matches!(self, Operator::Lt | Operator::Lte)
    }

    /// Evaluate `key <op> bound`.
    #[inline]
    pub fn admits(self, key: i32, bound: i32) -> bool {
        match self {
            Operator::Lt => key < bound,
            Operator::Lte => key <= bound,
            Operator::Gte => key >= bound,
            Operator::Gt => key > bound,
        }
    }
}

/// Cursor of the active scan.
#[derive(Debug)]
pub(crate) struct ScanState {
    high: i32,
    high_op: Operator,
    /// The cursor leaf; pinned for as long as this state exists.
    pub page_id: PageId,
    leaf: LeafNode,
    next_slot: usize,
}

/// Least slot whose key satisfies the low bound. Keys are sorted, so every
/// later slot satisfies it too.
fn first_slot_admitted(leaf: &LeafNode, low: i32, low_op: Operator) -> Option<usize> {
    let slot = leaf.keys().partition_point(|&k| !low_op.admits(k, low));
    (slot < leaf.len()).then_some(slot)
}

impl BTreeIndex {
    /// Position a cursor on the first entry in the range.
    ///
    /// Any scan already active is ended first.
    ///
    /// # Errors
    /// - `Error::BadOpcodes` unless `low_op` is `Gt`/`Gte` and `high_op` is
    ///   `Lt`/`Lte`
    /// - `Error::BadScanRange` if `low > high`; no page is read
    /// - `Error::NoSuchKeyFound` if no entry lies in the range; nothing stays
    ///   pinned
    pub fn start_scan(
        &mut self,
        low: i32,
        low_op: Operator,
        high: i32,
        high_op: Operator,
    ) -> Result<()> {
        if !low_op.is_lower_bound() || !high_op.is_upper_bound() {
            return Err(Error::BadOpcodes);
        }
        if low > high {
            return Err(Error::BadScanRange { low, high });
        }
        if self.scan.is_some() {
            self.end_scan()?;
        }

        let Descent {
            leaf_page_id: mut page_id,
            mut leaf,
            ..
        } = self.find_leaf(low)?;
        self.bpm().pin_page(page_id)?;

        loop {
            if let Some(slot) = first_slot_admitted(&leaf, low, low_op) {
                if !high_op.admits(leaf.key_at(slot), high) {
                    self.bpm().unpin_page(page_id, false)?;
                    return Err(Error::NoSuchKeyFound);
                }

                trace!(leaf = %page_id, slot, low, high, "scan started");
                self.scan = Some(ScanState {
                    high,
                    high_op,
                    page_id,
                    leaf,
                    next_slot: slot,
                });
                return Ok(());
            }

            let next = leaf.right_sibling;
            self.bpm().unpin_page(page_id, false)?;
            if !next.is_valid() {
                return Err(Error::NoSuchKeyFound);
            }
            leaf = self.pin_leaf(next)?;
            page_id = next;
        }
    }

    /// Record id of the next entry in the range.
    ///
    /// # Errors
    /// - `Error::ScanNotInitialized` if no scan is active
    /// - `Error::IndexScanCompleted` once the range is exhausted; the scan
    ///   is then over and its leaf unpinned
    pub fn scan_next(&mut self) -> Result<RecordId> {
        let mut state = self.scan.take().ok_or(Error::ScanNotInitialized)?;

        while state.next_slot >= state.leaf.len() {
            let next = state.leaf.right_sibling;
            self.bpm().unpin_page(state.page_id, false)?;
            if !next.is_valid() {
                trace!(leaf = %state.page_id, "scan reached the last leaf");
                return Err(Error::IndexScanCompleted);
            }
            state.leaf = self.pin_leaf(next)?;
            state.page_id = next;
            state.next_slot = 0;
        }

        if !state.high_op.admits(state.leaf.key_at(state.next_slot), state.high) {
            self.bpm().unpin_page(state.page_id, false)?;
            trace!(leaf = %state.page_id, "scan passed its high bound");
            return Err(Error::IndexScanCompleted);
        }

        let rid = state.leaf.rid_at(state.next_slot);
        state.next_slot += 1;
        self.scan = Some(state);
        Ok(rid)
    }

    /// Stop the active scan and unpin its leaf.
    ///
    /// # Errors
    /// `Error::ScanNotInitialized` if no scan is active.
    pub fn end_scan(&mut self) -> Result<()> {
        let state = self.scan.take().ok_or(Error::ScanNotInitialized)?;
        trace!(leaf = %state.page_id, "scan ended");
        self.bpm().unpin_page(state.page_id, false)
    }

    pub fn is_scan_active(&self) -> bool {
        self.scan.is_some()
    }

    /// Run a whole scan and collect its record ids. An empty range yields an
    /// empty vector rather than `NoSuchKeyFound`.
    pub fn scan_range(
        &mut self,
        low: i32,
        low_op: Operator,
        high: i32,
        high_op: Operator,
    ) -> Result<Vec<RecordId>> {
        match self.start_scan(low, low_op, high, high_op) {
            Ok(()) => {}
            Err(Error::NoSuchKeyFound) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        }

        let mut rids = Vec::new();
        loop {
            match self.scan_next() {
                Ok(rid) => rids.push(rid),
                Err(Error::IndexScanCompleted) => return Ok(rids),
                Err(e) => return Err(e),
            }
        }
    }

    /// Pin `page_id` for the cursor and decode it as a leaf. The pin is
    /// dropped again if the page is not a valid leaf.
    fn pin_leaf(&self, page_id: PageId) -> Result<LeafNode> {
        self.bpm().pin_page(page_id)?;
        let decoded = self
            .bpm()
            .fetch_page_read(page_id)
            .and_then(|guard| {
                let node = Node::decode(page_id, &guard)?;
                node.into_leaf(page_id)
            });

        if decoded.is_err() {
            self.bpm().unpin_page(page_id, false)?;
        }
        decoded
    }
}
