use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::buffer::{BufferPoolManager, StatsSnapshot};
use crate::common::config::{IndexConfig, MAX_TREE_HEIGHT};
use crate::common::{Error, PageId, RecordId, Result};
use crate::relation::{extract_key, RelationScan};
use crate::storage::DiskManager;

use super::node::{Datatype, IndexMeta, InternalNode, LeafNode, Node, MAX_RELATION_NAME_LEN};
use super::scan::ScanState;

/// The header page is always the first page of the index file.
pub(crate) const HEADER_PAGE_ID: PageId = PageId(0);

/// One step of a root-to-leaf descent: the internal node visited and the
/// child slot taken out of it.
#[derive(Debug)]
pub(crate) struct PathEntry {
    pub page_id: PageId,
    pub node: InternalNode,
    pub slot: usize,
}

/// Result of navigating to the leaf responsible for a key.
#[derive(Debug)]
pub(crate) struct Descent {
    pub leaf_page_id: PageId,
    pub leaf: LeafNode,
    /// Ancestors from the root down; empty when the root is a leaf.
    pub path: Vec<PathEntry>,
}

/// A B+Tree secondary index stored in its own paged file.
///
/// All mutating and scanning operations take `&mut self`; the index has a
/// single thread of control. At most one range scan is active at a time.
///
/// # Example
/// ```no_run
/// use secidx::{BTreeIndex, Datatype, IndexConfig, Operator, RecordId};
///
/// let rows = (1..=100u32).map(|i| (RecordId::new(i, 0), (i as i32).to_le_bytes().to_vec()));
/// let mut index = BTreeIndex::open(
///     "/tmp/db", "orders", 0, Datatype::Integer, rows, IndexConfig::default(),
/// )?;
///
/// let rids = index.scan_range(10, Operator::Gte, 20, Operator::Lt)?;
/// assert_eq!(rids.len(), 10);
/// index.close()?;
/// # Ok::<(), secidx::Error>(())
/// ```
pub struct BTreeIndex {
    bpm: BufferPoolManager,
    index_name: String,
    meta: IndexMeta,
    pub(crate) scan: Option<ScanState>,
}

impl BTreeIndex {
    /// File name of the index on `relation_name` at `attr_byte_offset`.
    pub fn index_file_name(relation_name: &str, attr_byte_offset: usize) -> String {
        format!("{}.{}", relation_name, attr_byte_offset)
    }

    /// Open the index for a relation attribute, building it if missing.
    ///
    /// When no index file exists in `dir`, one is created and bulk-loaded
    /// from `relation`. Otherwise `relation` is not read; the existing
    /// header must describe the same relation, offset and type.
    ///
    /// A new index is built under a staging name and renamed into place once
    /// it has been flushed. A build that fails leaves no index file behind,
    /// so the next `open` rebuilds from scratch.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` for a rejected `config`
    /// - `Error::BadIndexInfo` for an invalid relation name or a header that
    ///   describes a different attribute
    /// - `Error::RecordTooShort` / `Error::InvalidRecordId` while bulk-loading
    pub fn open<R: RelationScan>(
        dir: impl AsRef<Path>,
        relation_name: &str,
        attr_byte_offset: usize,
        attr_type: Datatype,
        relation: R,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        if relation_name.is_empty() || relation_name.len() > MAX_RELATION_NAME_LEN {
            return Err(Error::BadIndexInfo(format!(
                "relation name must be 1..={} bytes, got {}",
                MAX_RELATION_NAME_LEN,
                relation_name.len()
            )));
        }
        let stored_offset = u32::try_from(attr_byte_offset).map_err(|_| {
            Error::BadIndexInfo(format!("attribute offset {} out of range", attr_byte_offset))
        })?;

        let index_name = Self::index_file_name(relation_name, attr_byte_offset);
        let path = dir.as_ref().join(&index_name);

        if DiskManager::exists(&path) {
            let index = Self::open_existing(&path, index_name, config)?;
            index.check_describes(relation_name, stored_offset, attr_type)?;
            Ok(index)
        } else {
            let meta = IndexMeta {
                relation_name: relation_name.to_string(),
                attr_byte_offset: stored_offset,
                attr_type,
                root_page_id: PageId::INVALID,
                leaf_capacity: config.leaf_capacity as u16,
                internal_capacity: config.internal_capacity as u16,
            };
            let staging = Self::staging_path(&path);
            if DiskManager::exists(&staging) {
                debug!(path = %staging.display(), "removing stale staging file");
                fs::remove_file(&staging)?;
            }

            match Self::build(&staging, index_name, meta, config, relation, attr_byte_offset) {
                Ok(index) => {
                    fs::rename(&staging, &path)?;
                    Ok(index)
                }
                Err(e) => {
                    if DiskManager::exists(&staging) {
                        if let Err(cleanup) = fs::remove_file(&staging) {
                            warn!(path = %staging.display(), error = %cleanup, "failed to remove partial index");
                        }
                    }
                    Err(e)
                }
            }
        }
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".building");
        PathBuf::from(name)
    }

    /// Create, bulk-load and flush a new index at `path`. On error the index
    /// has already been dropped when this returns.
    fn build<R: RelationScan>(
        path: &Path,
        index_name: String,
        meta: IndexMeta,
        config: IndexConfig,
        relation: R,
        attr_byte_offset: usize,
    ) -> Result<Self> {
        let mut index = Self::create(path, index_name, meta, config)?;
        index.bulk_load(relation, attr_byte_offset)?;
        index.flush()?;
        Ok(index)
    }

    fn create(
        path: &Path,
        index_name: String,
        mut meta: IndexMeta,
        config: IndexConfig,
    ) -> Result<Self> {
        let bpm = BufferPoolManager::new(config.pool_size, DiskManager::create(path)?);

        {
            let mut header = bpm.new_page()?;
            let mut root = bpm.new_page()?;
            if header.page_id() != HEADER_PAGE_ID {
                return Err(Error::corrupt(header.page_id(), "new index file is not empty"));
            }

            LeafNode::new().encode_into(&mut root);
            meta.root_page_id = root.page_id();
            meta.encode_into(&mut header);
        }

        debug!(index = %index_name, root = %meta.root_page_id, "created index file");
        Ok(Self {
            bpm,
            index_name,
            meta,
            scan: None,
        })
    }

    fn open_existing(path: &Path, index_name: String, config: IndexConfig) -> Result<Self> {
        let bpm = BufferPoolManager::new(config.pool_size, DiskManager::open(path)?);
        if bpm.disk_page_count() == 0 {
            return Err(Error::corrupt(HEADER_PAGE_ID, "index file has no header page"));
        }

        let meta = {
            let header = bpm.fetch_page_read(HEADER_PAGE_ID)?;
            Node::decode(HEADER_PAGE_ID, &header)?.into_meta(HEADER_PAGE_ID)?
        };

        if meta.leaf_capacity as usize != config.leaf_capacity
            || meta.internal_capacity as usize != config.internal_capacity
        {
            debug!(
                index = %index_name,
                leaf_capacity = meta.leaf_capacity,
                internal_capacity = meta.internal_capacity,
                "using fan-out stored in the index header"
            );
        }
        debug!(index = %index_name, root = %meta.root_page_id, "opened index file");

        Ok(Self {
            bpm,
            index_name,
            meta,
            scan: None,
        })
    }

    fn check_describes(
        &self,
        relation_name: &str,
        attr_byte_offset: u32,
        attr_type: Datatype,
    ) -> Result<()> {
        let meta = &self.meta;
        if meta.relation_name != relation_name {
            return Err(Error::BadIndexInfo(format!(
                "index {} is on relation {:?}, not {:?}",
                self.index_name, meta.relation_name, relation_name
            )));
        }
        if meta.attr_byte_offset != attr_byte_offset {
            return Err(Error::BadIndexInfo(format!(
                "index {} is on attribute offset {}, not {}",
                self.index_name, meta.attr_byte_offset, attr_byte_offset
            )));
        }
        if meta.attr_type != attr_type {
            return Err(Error::BadIndexInfo(format!(
                "index {} is on a {:?} attribute, not {:?}",
                self.index_name, meta.attr_type, attr_type
            )));
        }
        Ok(())
    }

    fn bulk_load<R: RelationScan>(
        &mut self,
        mut relation: R,
        attr_byte_offset: usize,
    ) -> Result<()> {
        let mut loaded = 0usize;
        while let Some((rid, record)) = relation.scan_next()? {
            let key = extract_key(&record, attr_byte_offset, rid)?;
            self.insert_entry(key, rid)?;
            loaded += 1;
        }
        debug!(index = %self.index_name, entries = loaded, "bulk load finished");
        Ok(())
    }

    /// Walk from the root to the leaf responsible for `key`.
    ///
    /// The child is pinned before its parent is released, so at most two
    /// pages of the path are pinned at once.
    pub(crate) fn find_leaf(&self, key: i32) -> Result<Descent> {
        let mut page_id = self.meta.root_page_id;
        let mut guard = self.bpm.fetch_page_read(page_id)?;
        let mut path: Vec<PathEntry> = Vec::new();
        // Set once an internal node says what its children are.
        let mut children_are_leaves: Option<bool> = None;

        loop {
            let node = Node::decode(page_id, &guard)?;
            match node {
                Node::Leaf(leaf) => {
                    if children_are_leaves == Some(false) {
                        return Err(Error::corrupt(page_id, "leaf below a level-0 internal node"));
                    }
                    return Ok(Descent {
                        leaf_page_id: page_id,
                        leaf,
                        path,
                    });
                }
                Node::Internal(node) => {
                    if children_are_leaves == Some(true) {
                        return Err(Error::corrupt(page_id, "internal node below a level-1 node"));
                    }
                    if path.len() >= MAX_TREE_HEIGHT {
                        return Err(Error::corrupt(page_id, "descent exceeds maximum tree height"));
                    }

                    let slot = node.child_slot(key);
                    let child = node.child(slot);
                    children_are_leaves = Some(node.level == 1);
                    path.push(PathEntry {
                        page_id,
                        node,
                        slot,
                    });

                    let child_guard = self.bpm.fetch_page_read(child)?;
                    guard = child_guard;
                    page_id = child;
                }
                Node::Meta(_) => {
                    return Err(Error::corrupt(page_id, "header page reached during descent"));
                }
            }
        }
    }

    pub(crate) fn bpm(&self) -> &BufferPoolManager {
        &self.bpm
    }

    /// Point the header page at a new root.
    pub(crate) fn set_root(&mut self, root_page_id: PageId) -> Result<()> {
        let mut meta = self.meta.clone();
        meta.root_page_id = root_page_id;
        {
            let mut header = self.bpm.fetch_page_write(HEADER_PAGE_ID)?;
            meta.encode_into(&mut header);
        }
        self.meta = meta;
        Ok(())
    }

    #[inline]
    pub(crate) fn leaf_capacity(&self) -> usize {
        self.meta.leaf_capacity as usize
    }

    #[inline]
    pub(crate) fn internal_capacity(&self) -> usize {
        self.meta.internal_capacity as usize
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn relation_name(&self) -> &str {
        &self.meta.relation_name
    }

    pub fn attr_byte_offset(&self) -> usize {
        self.meta.attr_byte_offset as usize
    }

    pub fn root_page_id(&self) -> PageId {
        self.meta.root_page_id
    }

    /// Number of levels, counting the leaves. A lone root leaf is height 1.
    pub fn height(&self) -> Result<usize> {
        Ok(self.find_leaf(i32::MIN)?.path.len() + 1)
    }

    /// Keys of every leaf, leftmost first, following the sibling chain.
    ///
    /// # Errors
    /// `Error::Corrupt` if the chain revisits more pages than the file holds.
    pub fn leaf_chain(&self) -> Result<Vec<Vec<i32>>> {
        let Descent {
            leaf_page_id,
            mut leaf,
            ..
        } = self.find_leaf(i32::MIN)?;
        let max_leaves = self.bpm.disk_page_count() as usize;
        let mut chain = Vec::new();
        let mut page_id = leaf_page_id;

        loop {
            chain.push(leaf.keys().to_vec());
            if !leaf.right_sibling.is_valid() {
                return Ok(chain);
            }
            if chain.len() >= max_leaves {
                return Err(Error::corrupt(page_id, "leaf sibling chain has a cycle"));
            }

            page_id = leaf.right_sibling;
            let guard = self.bpm.fetch_page_read(page_id)?;
            leaf = Node::decode(page_id, &guard)?.into_leaf(page_id)?;
        }
    }

    /// Record ids of every entry with exactly `key`.
    pub fn lookup(&mut self, key: i32) -> Result<Vec<RecordId>> {
        self.scan_range(key, super::Operator::Gte, key, super::Operator::Lte)
    }

    /// Frames currently pinned; 1 while a scan holds its cursor leaf, else 0.
    pub fn pinned_page_count(&self) -> usize {
        self.bpm.pinned_frame_count()
    }

    pub fn buffer_stats(&self) -> StatsSnapshot {
        self.bpm.stats().snapshot()
    }

    /// Write every dirty page back and sync the file.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()
    }

    /// End any active scan, then flush.
    pub fn close(mut self) -> Result<()> {
        self.release_scan()?;
        self.flush()?;
        debug!(index = %self.index_name, "closed index");
        Ok(())
    }

    fn release_scan(&mut self) -> Result<()> {
        match self.scan.take() {
            Some(state) => self.bpm.unpin_page(state.page_id, false),
            None => Ok(()),
        }
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        if let Err(e) = self.release_scan().and_then(|()| self.flush()) {
            warn!(index = %self.index_name, error = %e, "failed to flush index on drop");
        }
    }
}

impl std::fmt::Debug for BTreeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTreeIndex")
            .field("index_name", &self.index_name)
            .field("meta", &self.meta)
            .field("scan_active", &self.scan.is_some())
            .finish()
    }
}
