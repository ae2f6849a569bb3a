//! # B+ Tree Storage Engine
//!
//! An in-memory, page-addressed B+ tree keyed by 32-bit unsigned integers,
//! storing opaque byte-string values.
//!
//! ## Architecture
//!
//! - **Page layer** (`page`): fixed 4096-byte buffers and typed leaf/internal
//!   node views over them.
//! - **Pager** (`pager`): a fixed-capacity array of lazily zero-allocated
//!   pages, addressed by monotonically assigned page number.
//! - **B+ tree layer** (`btree`): insertion with leaf/internal splitting,
//!   point lookup, and ordered iteration via a leaf-chained cursor.
//!
//! ## Usage
//!
//! ```rust
//! use bptree_storage::Db;
//!
//! let db = Db::with_default_config();
//! db.insert(42, b"hello").unwrap();
//! assert_eq!(db.get(42).unwrap(), Some(b"hello".to_vec()));
//! ```

pub mod btree;
pub mod error;
pub mod page;
pub mod pager;
pub mod types;

pub use error::{Result, StorageError};
pub use types::{BTreeConfig, PageId, PagerConfig, PAGE_SIZE};

pub use btree::BTree;
pub use pager::Pager;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Database configuration: the node-capacity limits and pager size a tree is
/// opened with.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    pub btree_config: BTreeConfig,
    pub pager_config: PagerConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn btree_config(mut self, config: BTreeConfig) -> Self {
        self.btree_config = config;
        self
    }

    pub fn pager_config(mut self, config: PagerConfig) -> Self {
        self.pager_config = config;
        self
    }
}

/// One exported node of the tree, for debugging/visualization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub page_num: u32,
    pub is_leaf: bool,
    /// Stored `parent` field; meaningless for the root (spec §3 Node header)
    pub parent: u32,
    pub is_root: bool,
    pub keys: Vec<u32>,
    /// Values, only populated for leaf nodes, parallel to `keys`
    pub values: Vec<Vec<u8>>,
    pub children: Vec<TreeNode>,
}

/// Database statistics
#[derive(Debug, Clone, Copy)]
pub struct DbStats {
    pub page_count: u32,
    pub pager_capacity: u32,
    pub tree_height: usize,
}

/// Main database handle: a B+ tree guarded by a lock, providing the public
/// key-value surface other layers build on.
///
/// Every operation here — including lookups — takes the write half of the
/// lock. The pager's only access method can zero-allocate a page it hasn't
/// seen before, so even a read is a potential mutation; there is no cheaper
/// read path to give a `RwLock` reader side something safe to do. The lock
/// still documents the engine's own stated model (§5: single-threaded,
/// single-writer) the same way the teacher's `Db` uses it to guard its tree.
pub struct Db {
    btree: RwLock<BTree>,
}

impl Db {
    /// Open a fresh, empty database with the given configuration
    pub fn open(config: Config) -> Result<Self> {
        let pager = Pager::new(config.pager_config);
        let btree = BTree::open(pager, config.btree_config)?;
        Ok(Self {
            btree: RwLock::new(btree),
        })
    }

    /// Open a fresh database with default node-capacity and pager limits
    pub fn with_default_config() -> Self {
        Self::open(Config::default()).expect("opening an empty pager never fails")
    }

    /// Insert `key`/`value`. Returns `Ok(true)` if inserted, `Ok(false)` if
    /// `key` was already present.
    pub fn insert(&self, key: u32, value: &[u8]) -> Result<bool> {
        self.btree.write().insert(key, value)
    }

    /// Look up a single key
    pub fn get(&self, key: u32) -> Result<Option<Vec<u8>>> {
        let mut btree = self.btree.write();
        let mut cursor = btree.find(key)?;
        if cursor.end_of_table() {
            return Ok(None);
        }
        if cursor.key()? != key {
            return Ok(None);
        }
        Ok(Some(cursor.value()?))
    }

    /// Check if a key exists
    pub fn contains(&self, key: u32) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Every key/value pair in ascending key order
    pub fn iter(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut btree = self.btree.write();
        let mut cursor = btree.start()?;
        let mut out = Vec::new();
        while !cursor.end_of_table() {
            let key = cursor.key()?;
            let value = cursor.value()?;
            out.push((key, value));
            cursor.advance()?;
        }
        Ok(out)
    }

    /// Statistics about the database
    pub fn stats(&self) -> Result<DbStats> {
        let mut btree = self.btree.write();
        let page_count = btree.num_pages();
        let pager_capacity = btree.pager_mut().capacity();
        let tree_height = tree_height(&mut btree)?;
        Ok(DbStats {
            page_count,
            pager_capacity,
            tree_height,
        })
    }

    /// Export the whole tree structure for debugging/visualization
    pub fn export_tree(&self) -> Result<TreeNode> {
        let mut btree = self.btree.write();
        export_node(&mut btree, PageId::ROOT.value())
    }
}

fn tree_height(btree: &mut BTree) -> Result<usize> {
    let mut page_num = PageId::ROOT.value();
    let mut depth = 1;
    loop {
        let node_type = btree
            .pager_mut()
            .get_page(page_num)?
            .node_type()
            .ok_or_else(|| StorageError::corrupt_node(page_num, "unrecognized node type byte"))?;
        if matches!(node_type, types::NodeType::Leaf) {
            break;
        }
        let child = {
            let view = btree.pager_mut().get_page(page_num)?.as_internal();
            if view.num_keys() > 0 {
                view.child_at(0)
            } else {
                view.right_child()
            }
        };
        page_num = child;
        depth += 1;
    }
    Ok(depth)
}

fn export_node(btree: &mut BTree, page_num: u32) -> Result<TreeNode> {
    let node_type = btree
        .pager_mut()
        .get_page(page_num)?
        .node_type()
        .ok_or_else(|| StorageError::corrupt_node(page_num, "unrecognized node type byte"))?;

    match node_type {
        types::NodeType::Leaf => {
            let leaf = btree.pager_mut().get_page(page_num)?.as_leaf();
            let (parent, is_root) = (leaf.parent(), leaf.is_root());
            let cells = leaf.read_all_cells();
            Ok(TreeNode {
                page_num,
                is_leaf: true,
                parent,
                is_root,
                keys: cells.iter().map(|c| c.key).collect(),
                values: cells.into_iter().map(|c| c.value).collect(),
                children: Vec::new(),
            })
        }
        types::NodeType::Internal => {
            let (cells, right_child, parent, is_root) = {
                let internal = btree.pager_mut().get_page(page_num)?.as_internal();
                (
                    internal.read_all_cells(),
                    internal.right_child(),
                    internal.parent(),
                    internal.is_root(),
                )
            };
            let mut keys = Vec::with_capacity(cells.len());
            let mut children = Vec::with_capacity(cells.len() + 1);
            for cell in &cells {
                keys.push(cell.key);
                children.push(export_node(btree, cell.child.value())?);
            }
            children.push(export_node(btree, right_child)?);
            Ok(TreeNode {
                page_num,
                is_leaf: false,
                parent,
                is_root,
                keys,
                values: Vec::new(),
                children,
            })
        }
    }
}
