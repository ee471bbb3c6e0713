//! Insertion with bottom-up split propagation.
//!
//! A split never recurses: the ancestors recorded during the descent are
//! popped one at a time until a node absorbs the new separator or the root
//! itself splits and a new root is allocated.

use tracing::{debug, trace};

use crate::common::{Error, PageId, RecordId, Result};

use super::index::{BTreeIndex, Descent, PathEntry};
use super::node::{InternalNode, LeafNode, PageKeyPair};

/// Entries an over-full leaf keeps when it splits: `ceil(M / 2)`.
#[inline]
fn leaf_split_point(leaf_capacity: usize) -> usize {
    leaf_capacity.div_ceil(2)
}

impl BTreeIndex {
    /// Add `(key, rid)` to the index. Duplicate keys are allowed.
    ///
    /// # Errors
    /// `Error::InvalidRecordId` if `rid` has page number 0, which marks an
    /// unused leaf slot. Storage and corruption errors leave the tree as it
    /// was at the failing page.
    pub fn insert_entry(&mut self, key: i32, rid: RecordId) -> Result<()> {
        if !rid.is_valid() {
            return Err(Error::InvalidRecordId(rid));
        }

        let Descent {
            leaf_page_id,
            leaf,
            mut path,
        } = self.find_leaf(key)?;
        let root_is_leaf = path.is_empty();

        let mut pending = self.insert_into_leaf(leaf_page_id, leaf, key, rid)?;
        while let Some(split) = pending {
            pending = match path.pop() {
                Some(parent) => self.insert_into_internal(parent, split)?,
                None => {
                    self.grow_root(split, root_is_leaf)?;
                    None
                }
            };
        }
        Ok(())
    }

    fn insert_into_leaf(
        &self,
        page_id: PageId,
        mut leaf: LeafNode,
        key: i32,
        rid: RecordId,
    ) -> Result<Option<PageKeyPair>> {
        let mut guard = self.bpm().fetch_page_write(page_id)?;
        let overflows = leaf.is_full(self.leaf_capacity());
        leaf.insert(key, rid);

        if !overflows {
            leaf.encode_into(&mut guard);
            return Ok(None);
        }

        let mut sibling_guard = self.bpm().new_page()?;
        let sibling_id = sibling_guard.page_id();

        let keep = leaf_split_point(self.leaf_capacity());
        let right = leaf.split_off(keep);
        leaf.right_sibling = sibling_id;
        right.encode_into(&mut sibling_guard);
        leaf.encode_into(&mut guard);

        // Navigation sends `k <= separator` left, so the separator is the
        // largest key that stayed in the left leaf.
        let separator = leaf.key_at(keep - 1);
        trace!(
            left = %page_id,
            right = %sibling_id,
            separator,
            left_len = leaf.len(),
            right_len = right.len(),
            "split leaf"
        );
        Ok(Some(PageKeyPair {
            page_id: sibling_id,
            key: separator,
        }))
    }

    fn insert_into_internal(
        &self,
        parent: PathEntry,
        split: PageKeyPair,
    ) -> Result<Option<PageKeyPair>> {
        let PathEntry {
            page_id,
            mut node,
            slot,
        } = parent;
        if slot > node.len() {
            return Err(Error::corrupt(page_id, format!("child slot {} past node end", slot)));
        }

        let mut guard = self.bpm().fetch_page_write(page_id)?;
        let overflows = node.is_full(self.internal_capacity());
        node.insert_child(slot, split.key, split.page_id);

        if !overflows {
            node.encode_into(&mut guard);
            return Ok(None);
        }

        let mut sibling_guard = self.bpm().new_page()?;
        let sibling_id = sibling_guard.page_id();

        let (pushed_up, right) = node.split();
        right.encode_into(&mut sibling_guard);
        node.encode_into(&mut guard);

        trace!(
            left = %page_id,
            right = %sibling_id,
            separator = pushed_up,
            level = node.level,
            "split internal node"
        );
        Ok(Some(PageKeyPair {
            page_id: sibling_id,
            key: pushed_up,
        }))
    }

    /// Replace the root after it split. The tree grows only here.
    fn grow_root(&mut self, split: PageKeyPair, old_root_was_leaf: bool) -> Result<()> {
        let old_root = self.root_page_id();
        let level = u8::from(old_root_was_leaf);

        let new_root = {
            let mut guard = self.bpm().new_page()?;
            InternalNode::new_root(level, old_root, split.key, split.page_id)
                .encode_into(&mut guard);
            guard.page_id()
        };
        self.set_root(new_root)?;

        debug!(
            index = %self.index_name(),
            old_root = %old_root,
            new_root = %new_root,
            separator = split.key,
            "grew tree by one level"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::IndexConfig;
    use crate::index::btree::{Datatype, Node};
    use tempfile::{tempdir, TempDir};

    fn empty_index(leaf_capacity: usize, internal_capacity: usize) -> (TempDir, BTreeIndex) {
        let dir = tempdir().unwrap();
        let config = IndexConfig::default()
            .with_leaf_capacity(leaf_capacity)
            .with_internal_capacity(internal_capacity)
            .with_pool_size(8);
        let index = BTreeIndex::open(
            dir.path(),
            "t",
            0,
            Datatype::Integer,
            std::iter::empty::<(RecordId, Vec<u8>)>(),
            config,
        )
        .unwrap();
        (dir, index)
    }

    fn rid(k: i32) -> RecordId {
        RecordId::new(k.unsigned_abs() + 1, 0)
    }

    fn decode(index: &BTreeIndex, page_id: PageId) -> Node {
        let guard = index.bpm().fetch_page_read(page_id).unwrap();
        Node::decode(page_id, &guard).unwrap()
    }

    #[test]
    fn test_split_point_rounds_up() {
        assert_eq!(leaf_split_point(4), 2);
        assert_eq!(leaf_split_point(5), 3);
        assert_eq!(leaf_split_point(340), 170);
    }

    #[test]
    fn test_rejects_unused_record_id() {
        let (_dir, mut index) = empty_index(4, 4);

        let err = index.insert_entry(1, RecordId::UNUSED).unwrap_err();
        assert!(matches!(err, Error::InvalidRecordId(_)));
        assert_eq!(index.leaf_chain().unwrap(), vec![Vec::<i32>::new()]);
    }

    #[test]
    fn test_root_leaf_split_builds_level_one_root() {
        let (_dir, mut index) = empty_index(4, 4);
        let old_root = index.root_page_id();

        for k in [10, 20, 30, 40, 50] {
            index.insert_entry(k, rid(k)).unwrap();
        }

        assert_ne!(index.root_page_id(), old_root);
        assert_eq!(index.height().unwrap(), 2);

        let root = decode(&index, index.root_page_id())
            .into_internal(index.root_page_id())
            .unwrap();
        assert_eq!(root.level, 1);
        assert_eq!(root.keys(), &[20]);
        assert_eq!(root.children()[0], old_root);
        assert_eq!(index.leaf_chain().unwrap(), vec![vec![10, 20], vec![30, 40, 50]]);
        assert_eq!(index.pinned_page_count(), 0);
    }

    #[test]
    fn test_new_leaf_inherits_right_sibling() {
        let (_dir, mut index) = empty_index(4, 4);
        for k in [10, 20, 30, 40, 50] {
            index.insert_entry(k, rid(k)).unwrap();
        }
        // Splitting the left leaf must splice the new leaf into the chain.
        for k in [1, 2, 3] {
            index.insert_entry(k, rid(k)).unwrap();
        }

        assert_eq!(
            index.leaf_chain().unwrap(),
            vec![vec![1, 2], vec![3, 10, 20], vec![30, 40, 50]]
        );
        let root = decode(&index, index.root_page_id())
            .into_internal(index.root_page_id())
            .unwrap();
        assert_eq!(root.keys(), &[2, 20]);
    }

    #[test]
    fn test_every_key_found_in_its_leaf() {
        let (_dir, mut index) = empty_index(4, 3);
        let keys: Vec<i32> = (0..120).map(|i| (i * 53) % 241 - 120).collect();
        for &k in &keys {
            index.insert_entry(k, rid(k)).unwrap();
        }
        assert!(index.height().unwrap() >= 3);

        for &k in &keys {
            let descent = index.find_leaf(k).unwrap();
            assert!(
                descent.leaf.keys().contains(&k),
                "key {} routed to leaf {:?}",
                k,
                descent.leaf.keys()
            );
        }
        assert_eq!(index.pinned_page_count(), 0);
    }

    #[test]
    fn test_internal_split_grows_level_zero_root() {
        let (_dir, mut index) = empty_index(2, 2);
        for k in 1..=20 {
            index.insert_entry(k, rid(k)).unwrap();
        }

        assert!(index.height().unwrap() >= 3);
        let root = decode(&index, index.root_page_id())
            .into_internal(index.root_page_id())
            .unwrap();
        assert_eq!(root.level, 0);

        let keys: Vec<i32> = index.leaf_chain().unwrap().concat();
        assert_eq!(keys, (1..=20).collect::<Vec<_>>());
        assert_eq!(index.pinned_page_count(), 0);
    }

    #[test]
    fn test_header_tracks_new_root() {
        let (_dir, mut index) = empty_index(2, 2);
        for k in 0..10 {
            index.insert_entry(k, rid(k)).unwrap();
        }

        let meta = decode(&index, PageId::new(0)).into_meta(PageId::new(0)).unwrap();
        assert_eq!(meta.root_page_id, index.root_page_id());
    }

    #[test]
    fn test_duplicates_span_leaves() {
        let (_dir, mut index) = empty_index(3, 3);
        for page in 1..=10u32 {
            index.insert_entry(7, RecordId::new(page, 0)).unwrap();
        }

        let rids = index.lookup(7).unwrap();
        let mut pages: Vec<u32> = rids.iter().map(|r| r.page_number).collect();
        pages.sort_unstable();
        assert_eq!(pages, (1..=10).collect::<Vec<_>>());
        assert!(index.leaf_chain().unwrap().len() > 1);
    }
}
