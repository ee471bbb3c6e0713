//! On-page formats of the index: header (metadata), internal and leaf nodes.
//!
//! Every format starts with a [`PageHeader`] whose [`PageType`] selects the
//! decoder. Nodes are persisted as an explicit `count` followed by
//! fixed-capacity arrays; slots past `count` hold a sentinel and decoding
//! rejects any page where the used prefix and the sentinel suffix disagree.
//!
//! # Leaf layout
//! ```text
//! Offset  Size            Field
//! 0       8               PageHeader (type = BTreeLeaf)
//! 8       2               count
//! 10      4               right sibling page id (u32::MAX = none)
//! 14      4 × M           keys (i32 LE)
//! ..      8 × M           record ids (page 0 = unused)
//! ```
//!
//! # Internal layout
//! ```text
//! Offset  Size            Field
//! 0       8               PageHeader (type = BTreeInternal)
//! 8       1               level (1 = children are leaves)
//! 9       1               zero padding
//! 10      2               count (separator keys)
//! 12      4 × N           keys (i32 LE)
//! ..      4 × (N + 1)     child page ids (u32::MAX = unused)
//! ```

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

const KEY_SIZE: usize = 4;
const CHILD_SIZE: usize = 4;

const LEAF_COUNT: usize = PageHeader::SIZE;
const LEAF_SIBLING: usize = LEAF_COUNT + 2;
const LEAF_KEYS: usize = LEAF_SIBLING + 4;

/// Maximum entries a leaf page can hold (*M*).
pub const LEAF_CAPACITY: usize = (PAGE_SIZE - LEAF_KEYS) / (KEY_SIZE + RecordId::SIZE);
const LEAF_RIDS: usize = LEAF_KEYS + LEAF_CAPACITY * KEY_SIZE;

const INTERNAL_LEVEL: usize = PageHeader::SIZE;
const INTERNAL_COUNT: usize = INTERNAL_LEVEL + 2;
const INTERNAL_KEYS: usize = INTERNAL_COUNT + 2;

/// Maximum separator keys an internal page can hold (*N*).
pub const INTERNAL_CAPACITY: usize =
    (PAGE_SIZE - INTERNAL_KEYS - CHILD_SIZE) / (KEY_SIZE + CHILD_SIZE);
const INTERNAL_CHILDREN: usize = INTERNAL_KEYS + INTERNAL_CAPACITY * KEY_SIZE;

const META_ATTR_OFFSET: usize = PageHeader::SIZE;
const META_ATTR_TYPE: usize = META_ATTR_OFFSET + 4;
const META_NAME_LEN: usize = META_ATTR_TYPE + 1;
const META_LEAF_CAPACITY: usize = META_NAME_LEN + 1;
const META_INTERNAL_CAPACITY: usize = META_LEAF_CAPACITY + 2;
const META_ROOT: usize = META_INTERNAL_CAPACITY + 2;
const META_NAME: usize = META_ROOT + 4;

/// Longest relation name the header page stores, in bytes.
pub const MAX_RELATION_NAME_LEN: usize = 64;

const _: () = assert!(LEAF_RIDS + LEAF_CAPACITY * RecordId::SIZE <= PAGE_SIZE);
const _: () = assert!(INTERNAL_CHILDREN + (INTERNAL_CAPACITY + 1) * CHILD_SIZE <= PAGE_SIZE);
const _: () = assert!(META_NAME + MAX_RELATION_NAME_LEN <= PAGE_SIZE);

#[inline]
fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
fn read_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
fn write_bytes(data: &mut [u8], at: usize, bytes: &[u8]) {
    data[at..at + bytes.len()].copy_from_slice(bytes);
}

/// Type of the indexed attribute.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datatype {
    Integer = 0,
}

impl Datatype {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Datatype::Integer),
            _ => None,
        }
    }
}

/// A freshly split-off right node announced to its parent: the new page
/// and the separator key to insert ahead of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageKeyPair {
    pub page_id: PageId,
    pub key: i32,
}

/// A decoded index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Meta(IndexMeta),
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    /// Decode `page` by its header discriminant after checking its checksum.
    ///
    /// # Errors
    /// `Error::Corrupt` for a checksum mismatch, an unknown page type, or a
    /// node violating the used-prefix invariant.
    pub fn decode(page_id: PageId, page: &Page) -> Result<Node> {
        let header = page.header();
        if !header.verify_checksum(page.as_slice()) {
            return Err(Error::corrupt(page_id, "checksum mismatch"));
        }

        let data = page.as_slice();
        match header.page_type {
            PageType::IndexMeta => IndexMeta::decode(page_id, data).map(Node::Meta),
            PageType::BTreeInternal => InternalNode::decode(page_id, data).map(Node::Internal),
            PageType::BTreeLeaf => LeafNode::decode(page_id, data).map(Node::Leaf),
            PageType::Invalid => Err(Error::corrupt(page_id, "page was never initialised")),
        }
    }

    pub fn into_leaf(self, page_id: PageId) -> Result<LeafNode> {
        match self {
            Node::Leaf(leaf) => Ok(leaf),
            _ => Err(Error::corrupt(page_id, "expected a leaf node")),
        }
    }

    pub fn into_internal(self, page_id: PageId) -> Result<InternalNode> {
        match self {
            Node::Internal(node) => Ok(node),
            _ => Err(Error::corrupt(page_id, "expected an internal node")),
        }
    }

    pub fn into_meta(self, page_id: PageId) -> Result<IndexMeta> {
        match self {
            Node::Meta(meta) => Ok(meta),
            _ => Err(Error::corrupt(page_id, "expected the index header page")),
        }
    }
}

// ============================================================================
// Header page
// ============================================================================

/// Contents of the index header page.
///
/// # Layout
/// ```text
/// Offset  Size  Field
/// 0       8     PageHeader (type = IndexMeta)
/// 8       4     attribute byte offset
/// 12      1     attribute datatype
/// 13      1     relation name length
/// 14      2     leaf capacity
/// 16      2     internal capacity
/// 18      4     root page id
/// 22      64    relation name (UTF-8, zero padded)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    pub relation_name: String,
    pub attr_byte_offset: u32,
    pub attr_type: Datatype,
    pub root_page_id: PageId,
    pub leaf_capacity: u16,
    pub internal_capacity: u16,
}

impl IndexMeta {
    fn decode(page_id: PageId, data: &[u8]) -> Result<Self> {
        let attr_type = Datatype::from_u8(data[META_ATTR_TYPE])
            .ok_or_else(|| Error::corrupt(page_id, "unknown attribute datatype"))?;

        let name_len = data[META_NAME_LEN] as usize;
        if name_len == 0 || name_len > MAX_RELATION_NAME_LEN {
            return Err(Error::corrupt(page_id, "relation name length out of range"));
        }
        let relation_name = std::str::from_utf8(&data[META_NAME..META_NAME + name_len])
            .map_err(|_| Error::corrupt(page_id, "relation name is not UTF-8"))?
            .to_string();

        let leaf_capacity = read_u16(data, META_LEAF_CAPACITY);
        let internal_capacity = read_u16(data, META_INTERNAL_CAPACITY);
        if !(2..=LEAF_CAPACITY).contains(&(leaf_capacity as usize))
            || !(2..=INTERNAL_CAPACITY).contains(&(internal_capacity as usize))
        {
            return Err(Error::corrupt(page_id, "stored fan-out out of range"));
        }

        let root_page_id = PageId::new(read_u32(data, META_ROOT));
        if !root_page_id.is_valid() || root_page_id == page_id {
            return Err(Error::corrupt(page_id, "invalid root page id"));
        }

        Ok(Self {
            relation_name,
            attr_byte_offset: read_u32(data, META_ATTR_OFFSET),
            attr_type,
            root_page_id,
            leaf_capacity,
            internal_capacity,
        })
    }

    /// Overwrite `page` with this header.
    ///
    /// # Panics
    /// Panics if the relation name exceeds [`MAX_RELATION_NAME_LEN`].
    pub fn encode_into(&self, page: &mut Page) {
        let name = self.relation_name.as_bytes();
        assert!(name.len() <= MAX_RELATION_NAME_LEN, "relation name too long");

        page.reset();
        let data = page.as_mut_slice();
        write_bytes(data, META_ATTR_OFFSET, &self.attr_byte_offset.to_le_bytes());
        data[META_ATTR_TYPE] = self.attr_type as u8;
        data[META_NAME_LEN] = name.len() as u8;
        write_bytes(data, META_LEAF_CAPACITY, &self.leaf_capacity.to_le_bytes());
        write_bytes(data, META_INTERNAL_CAPACITY, &self.internal_capacity.to_le_bytes());
        write_bytes(data, META_ROOT, &self.root_page_id.0.to_le_bytes());
        write_bytes(data, META_NAME, name);
        page.seal(PageType::IndexMeta);
    }
}

// ============================================================================
// Internal node
// ============================================================================

/// Separator keys and child pointers.
///
/// `children.len() == keys.len() + 1` always; child `i` covers keys in
/// `(keys[i-1], keys[i]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    /// 1 if the children are leaves, 0 otherwise.
    pub level: u8,
    keys: Vec<i32>,
    children: Vec<PageId>,
}

impl InternalNode {
    /// A fresh root over two children.
    pub fn new_root(level: u8, left: PageId, separator: i32, right: PageId) -> Self {
        Self {
            level,
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    /// Number of separator keys.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_full(&self, capacity: usize) -> bool {
        self.keys.len() >= capacity
    }

    pub fn keys(&self) -> &[i32] {
        &self.keys
    }

    pub fn children(&self) -> &[PageId] {
        &self.children
    }

    /// Least slot `i` with `key <= keys[i]`, or the last slot when `key`
    /// exceeds every separator.
    #[inline]
    pub fn child_slot(&self, key: i32) -> usize {
        self.keys.partition_point(|&k| k < key)
    }

    #[inline]
    pub fn child(&self, slot: usize) -> PageId {
        self.children[slot]
    }

    /// Record that the child at `slot` split and `right` now follows it.
    pub fn insert_child(&mut self, slot: usize, separator: i32, right: PageId) {
        self.keys.insert(slot, separator);
        self.children.insert(slot + 1, right);
    }

    /// Split an over-full node around its middle key.
    ///
    /// `self` keeps the lower keys, the returned node gets the upper keys,
    /// and the middle key is returned to be pushed into the parent. It is
    /// kept in neither half.
    pub fn split(&mut self) -> (i32, InternalNode) {
        let mid = self.keys.len() / 2;
        let right_keys = self.keys.split_off(mid + 1);
        let right_children = self.children.split_off(mid + 1);
        let pushed_up = self.keys.pop().unwrap_or_default();

        (
            pushed_up,
            InternalNode {
                level: self.level,
                keys: right_keys,
                children: right_children,
            },
        )
    }

    fn decode(page_id: PageId, data: &[u8]) -> Result<Self> {
        let level = data[INTERNAL_LEVEL];
        if level > 1 {
            return Err(Error::corrupt(page_id, format!("internal level {}", level)));
        }

        let count = read_u16(data, INTERNAL_COUNT) as usize;
        if count == 0 || count > INTERNAL_CAPACITY {
            return Err(Error::corrupt(
                page_id,
                format!("internal key count {} outside 1..={}", count, INTERNAL_CAPACITY),
            ));
        }

        let mut keys = Vec::with_capacity(count + 1);
        for i in 0..count {
            let key = read_i32(data, INTERNAL_KEYS + i * KEY_SIZE);
            if keys.last().is_some_and(|&prev| key < prev) {
                return Err(Error::corrupt(page_id, format!("separator {} out of order", i)));
            }
            keys.push(key);
        }

        let mut children = Vec::with_capacity(count + 2);
        for i in 0..=INTERNAL_CAPACITY {
            let child = PageId::new(read_u32(data, INTERNAL_CHILDREN + i * CHILD_SIZE));
            match (i <= count, child.is_valid()) {
                (true, true) => children.push(child),
                (true, false) => {
                    return Err(Error::corrupt(page_id, format!("gap at child slot {}", i)))
                }
                (false, true) => {
                    return Err(Error::corrupt(
                        page_id,
                        format!("child slot {} used past count {}", i, count),
                    ))
                }
                (false, false) => {}
            }
        }

        Ok(Self {
            level,
            keys,
            children,
        })
    }

    /// Overwrite `page` with this node.
    ///
    /// # Panics
    /// Panics if the node holds more than [`INTERNAL_CAPACITY`] keys.
    pub fn encode_into(&self, page: &mut Page) {
        assert!(self.keys.len() <= INTERNAL_CAPACITY, "internal node over capacity");
        debug_assert_eq!(self.children.len(), self.keys.len() + 1);

        page.reset();
        let data = page.as_mut_slice();
        data[INTERNAL_LEVEL] = self.level;
        write_bytes(data, INTERNAL_COUNT, &(self.keys.len() as u16).to_le_bytes());
        for (i, key) in self.keys.iter().enumerate() {
            write_bytes(data, INTERNAL_KEYS + i * KEY_SIZE, &key.to_le_bytes());
        }
        for i in 0..=INTERNAL_CAPACITY {
            let child = self.children.get(i).copied().unwrap_or(PageId::INVALID);
            write_bytes(data, INTERNAL_CHILDREN + i * CHILD_SIZE, &child.0.to_le_bytes());
        }
        page.seal(PageType::BTreeInternal);
    }
}

// ============================================================================
// Leaf node
// ============================================================================

/// Sorted (key, record id) entries plus the link to the next leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    keys: Vec<i32>,
    rids: Vec<RecordId>,
    pub right_sibling: PageId,
}

impl LeafNode {
    /// An empty rightmost leaf.
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            rids: Vec::new(),
            right_sibling: PageId::INVALID,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when one more insert would push the leaf past `capacity`.
    #[inline]
    pub fn is_full(&self, capacity: usize) -> bool {
        self.keys.len() >= capacity
    }

    pub fn keys(&self) -> &[i32] {
        &self.keys
    }

    #[inline]
    pub fn key_at(&self, slot: usize) -> i32 {
        self.keys[slot]
    }

    #[inline]
    pub fn rid_at(&self, slot: usize) -> RecordId {
        self.rids[slot]
    }

    /// Insert after any entries with an equal key.
    pub fn insert(&mut self, key: i32, rid: RecordId) {
        let slot = self.keys.partition_point(|&k| k <= key);
        self.keys.insert(slot, key);
        self.rids.insert(slot, rid);
    }

    /// Move every entry from `keep` onwards into a new leaf.
    ///
    /// The new leaf inherits this leaf's right sibling; the caller links
    /// this leaf to the new page once it has an id.
    pub fn split_off(&mut self, keep: usize) -> LeafNode {
        LeafNode {
            keys: self.keys.split_off(keep),
            rids: self.rids.split_off(keep),
            right_sibling: self.right_sibling,
        }
    }

    fn decode(page_id: PageId, data: &[u8]) -> Result<Self> {
        let count = read_u16(data, LEAF_COUNT) as usize;
        if count > LEAF_CAPACITY {
            return Err(Error::corrupt(
                page_id,
                format!("leaf count {} exceeds capacity {}", count, LEAF_CAPACITY),
            ));
        }

        let mut keys = Vec::with_capacity(count + 1);
        let mut rids = Vec::with_capacity(count + 1);
        for i in 0..LEAF_CAPACITY {
            let rid_bytes = &data[LEAF_RIDS + i * RecordId::SIZE..][..RecordId::SIZE];
            if i >= count {
                if rid_bytes.iter().any(|&b| b != 0) {
                    return Err(Error::corrupt(
                        page_id,
                        format!("leaf slot {} used past count {}", i, count),
                    ));
                }
                continue;
            }

            let rid = RecordId::from_bytes(rid_bytes)
                .filter(RecordId::is_valid)
                .ok_or_else(|| Error::corrupt(page_id, format!("gap at leaf slot {}", i)))?;
            let key = read_i32(data, LEAF_KEYS + i * KEY_SIZE);
            if keys.last().is_some_and(|&prev| key < prev) {
                return Err(Error::corrupt(page_id, format!("leaf key {} out of order", i)));
            }
            keys.push(key);
            rids.push(rid);
        }

        Ok(Self {
            keys,
            rids,
            right_sibling: PageId::new(read_u32(data, LEAF_SIBLING)),
        })
    }

    /// Overwrite `page` with this leaf.
    ///
    /// # Panics
    /// Panics if the leaf holds more than [`LEAF_CAPACITY`] entries.
    pub fn encode_into(&self, page: &mut Page) {
        assert!(self.keys.len() <= LEAF_CAPACITY, "leaf node over capacity");

        page.reset();
        let data = page.as_mut_slice();
        write_bytes(data, LEAF_COUNT, &(self.keys.len() as u16).to_le_bytes());
        write_bytes(data, LEAF_SIBLING, &self.right_sibling.0.to_le_bytes());
        for (i, (key, rid)) in self.keys.iter().zip(&self.rids).enumerate() {
            write_bytes(data, LEAF_KEYS + i * KEY_SIZE, &key.to_le_bytes());
            write_bytes(data, LEAF_RIDS + i * RecordId::SIZE, &rid.to_bytes());
        }
        page.seal(PageType::BTreeLeaf);
    }
}

impl Default for LeafNode {
    fn default() -> Self {
        Self::new()
    }
}
