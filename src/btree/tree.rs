//! B+ tree core implementation.
//!
//! Keys are fixed 32-bit unsigned integers; values are opaque byte strings.
//! The tree supports ordered point lookup, ordered range scan via a
//! leaf-chained cursor, and duplicate-rejecting insertion. There is no
//! deletion.

use crate::btree::Cursor;
use crate::error::{Result, StorageError};
use crate::page::{InternalCell, LeafCell};
use crate::pager::Pager;
use crate::types::{BTreeConfig, NodeType, PageId};

/// A disk-addressed B+ tree layered on a [`Pager`]
pub struct BTree {
    pager: Pager,
    config: BTreeConfig,
}

impl BTree {
    /// Open a tree over `pager`, initializing page 0 as an empty root leaf
    /// if the pager has never been touched
    pub fn open(mut pager: Pager, config: BTreeConfig) -> Result<Self> {
        if pager.num_pages() == 0 {
            pager.get_page_mut(PageId::ROOT.value())?.as_leaf_mut().init(true, 0);
        }
        Ok(Self { pager, config })
    }

    /// Open a tree with the default node-capacity configuration
    pub fn with_default_config(pager: Pager) -> Result<Self> {
        Self::open(pager, BTreeConfig::default())
    }

    /// The configuration this tree enforces split thresholds against
    pub fn config(&self) -> BTreeConfig {
        self.config
    }

    /// Number of pages the underlying pager has allocated so far
    pub fn num_pages(&self) -> u32 {
        self.pager.num_pages()
    }

    /// Release all page memory. Any outstanding cursor already holds the
    /// only `&mut` borrow of this tree, so there is nothing further to
    /// enforce here beyond what the borrow checker already guarantees.
    pub fn close(self) {
        drop(self);
    }

    /// Insert `key`/`value`. Returns `Ok(true)` if inserted, `Ok(false)` if
    /// `key` was already present (the tree is left unchanged).
    pub fn insert(&mut self, key: u32, value: &[u8]) -> Result<bool> {
        let (leaf_page, pos) = self.find_leaf(key)?;
        let num_cells = self.pager.get_page(leaf_page)?.as_leaf().num_cells();

        if (pos as u16) < num_cells && self.pager.get_page(leaf_page)?.as_leaf().key_at(pos) == key
        {
            return Ok(false);
        }

        if (num_cells as usize) < self.config.max_leaf_cells {
            self.pager
                .get_page_mut(leaf_page)?
                .as_leaf_mut()
                .insert_cell(pos, key, value);
        } else {
            self.split_leaf_and_insert(leaf_page, pos, key, value)?;
        }
        Ok(true)
    }

    /// Position a cursor at `key`, or at the insertion point if absent
    pub fn find(&mut self, key: u32) -> Result<Cursor<'_>> {
        let (page_num, pos) = self.find_leaf(key)?;
        let end_of_table = {
            let leaf = self.pager.get_page(page_num)?.as_leaf();
            pos >= leaf.num_cells() && leaf.next_leaf() == 0
        };
        Ok(Cursor::new(self, page_num, pos, end_of_table))
    }

    /// Position a cursor at the leftmost cell of the leftmost leaf
    pub fn start(&mut self) -> Result<Cursor<'_>> {
        let mut page_num = PageId::ROOT.value();
        loop {
            match self.node_type_at(page_num)? {
                NodeType::Internal => {
                    let child = {
                        let view = self.pager.get_page(page_num)?.as_internal();
                        if view.num_keys() > 0 {
                            view.child_at(0)
                        } else {
                            view.right_child()
                        }
                    };
                    page_num = child;
                }
                NodeType::Leaf => break,
            }
        }
        let end_of_table = self.pager.get_page(page_num)?.as_leaf().num_cells() == 0;
        Ok(Cursor::new(self, page_num, 0, end_of_table))
    }

    pub(crate) fn pager_mut(&mut self) -> &mut Pager {
        &mut self.pager
    }

    fn node_type_at(&mut self, page_num: u32) -> Result<NodeType> {
        self.pager
            .get_page(page_num)?
            .node_type()
            .ok_or_else(|| StorageError::corrupt_node(page_num, "unrecognized node type byte"))
    }

    /// Descend from the root to the leaf that holds (or would hold) `key`,
    /// returning its page number and the in-leaf cell position
    fn find_leaf(&mut self, key: u32) -> Result<(u32, u16)> {
        let mut page_num = PageId::ROOT.value();
        loop {
            match self.node_type_at(page_num)? {
                NodeType::Internal => {
                    page_num = self.pager.get_page(page_num)?.as_internal().child_for_key(key);
                }
                NodeType::Leaf => {
                    let pos = match self.pager.get_page(page_num)?.as_leaf().find_key(key) {
                        Ok(i) | Err(i) => i,
                    };
                    return Ok((page_num, pos));
                }
            }
        }
    }

    /// Largest key reachable under `page_num`: a leaf's last cell, or (recursing
    /// into `right_child`) the true maximum of an internal node's subtree.
    ///
    /// `find`/`find_child_index` route by comparing a key against stored
    /// routing keys, so those routing keys must equal the true subtree max of
    /// the child they bound — the last routing key of an internal child is not
    /// enough, since keys above it but still under its `right_child` would
    /// otherwise misroute to the wrong sibling.
    fn max_key_of(&mut self, page_num: u32) -> Result<u32> {
        match self.node_type_at(page_num)? {
            NodeType::Leaf => {
                let leaf = self.pager.get_page(page_num)?.as_leaf();
                let n = leaf.num_cells();
                if n == 0 {
                    return Err(StorageError::corrupt_node(page_num, "empty leaf has no max key"));
                }
                Ok(leaf.key_at(n - 1))
            }
            NodeType::Internal => {
                let right_child = self.pager.get_page(page_num)?.as_internal().right_child();
                self.max_key_of(right_child)
            }
        }
    }

    fn set_parent(&mut self, page_num: u32, parent: u32) -> Result<()> {
        match self.node_type_at(page_num)? {
            NodeType::Leaf => self.pager.get_page_mut(page_num)?.as_leaf_mut().set_parent(parent),
            NodeType::Internal => self
                .pager
                .get_page_mut(page_num)?
                .as_internal_mut()
                .set_parent(parent),
        }
        Ok(())
    }

    fn split_leaf_and_insert(&mut self, leaf_page: u32, pos: u16, key: u32, value: &[u8]) -> Result<()> {
        let (was_root, parent, old_next_leaf) = {
            let leaf = self.pager.get_page(leaf_page)?.as_leaf();
            (leaf.is_root(), leaf.parent(), leaf.next_leaf())
        };

        let mut all_cells = self.pager.get_page(leaf_page)?.as_leaf().read_all_cells();
        all_cells.insert(pos as usize, LeafCell::new(key, value.to_vec()));

        let old_max_before_split = all_cells.last().expect("just inserted a cell").key;
        let left_count = (all_cells.len() + 1) / 2;
        let right_cells = all_cells.split_off(left_count);
        let new_old_max = all_cells.last().expect("left half non-empty").key;

        let new_page = self.pager.allocate_page()?;

        self.pager.get_page_mut(leaf_page)?.as_leaf_mut().write_cells(&all_cells);
        self.pager.get_page_mut(leaf_page)?.as_leaf_mut().set_next_leaf(new_page);

        {
            let buf = self.pager.get_page_mut(new_page)?;
            let mut view = buf.as_leaf_mut();
            view.init(false, parent);
            view.write_cells(&right_cells);
            view.set_next_leaf(old_next_leaf);
        }

        if was_root {
            self.create_new_root(new_page)?;
        } else {
            self.update_internal_node_key(parent, leaf_page, old_max_before_split, new_old_max)?;
            self.insert_child(parent, new_page)?;
        }
        Ok(())
    }

    /// Rewrite the routing key in `parent` that bounds `child_page` so that
    /// it equals `new_key` instead of `old_key`, leaving the child pointer
    /// untouched. `child_page` may be `parent`'s `right_child`, which has no
    /// explicit routing key to begin with — nothing to rewrite there, since
    /// its bound is whatever `get_node_max_key` recomputes on demand.
    fn update_internal_node_key(
        &mut self,
        parent_page: u32,
        child_page: u32,
        old_key: u32,
        new_key: u32,
    ) -> Result<()> {
        if self.pager.get_page(parent_page)?.as_internal().right_child() == child_page {
            return Ok(());
        }
        let idx = {
            let internal = self.pager.get_page(parent_page)?.as_internal();
            (0..internal.num_keys()).find(|&i| internal.key_at(i) == old_key)
        };
        let idx = idx.ok_or_else(|| {
            StorageError::corrupt_node(
                parent_page,
                format!("routing key {old_key} not found while rewriting to {new_key}"),
            )
        })?;
        self.pager.get_page_mut(parent_page)?.as_internal_mut().set_key_at(idx, new_key);
        Ok(())
    }

    /// Install `child_page` as a new child of `parent_page`, splitting the
    /// parent first if it is already at capacity
    fn insert_child(&mut self, parent_page: u32, child_page: u32) -> Result<()> {
        let child_max = self.max_key_of(child_page)?;
        let num_keys = self.pager.get_page(parent_page)?.as_internal().num_keys();

        if (num_keys as usize) < self.config.max_internal_cells {
            let right_child = self.pager.get_page(parent_page)?.as_internal().right_child();
            let right_max = self.max_key_of(right_child)?;

            // `child_max` can only exceed every existing routing key yet still
            // be smaller than `right_child`'s own subtree max — that happens
            // whenever the split child being installed sits strictly between
            // the last explicit key and `right_child`. Only displace
            // `right_child` when the new child truly becomes the new overall
            // rightmost subtree.
            if child_max > right_max {
                let mut view = self.pager.get_page_mut(parent_page)?.as_internal_mut();
                view.insert_cell(num_keys, InternalCell::new(PageId::new(right_child), right_max));
                view.set_right_child(child_page);
            } else {
                let idx = self.pager.get_page(parent_page)?.as_internal().find_child_index(child_max);
                self.pager
                    .get_page_mut(parent_page)?
                    .as_internal_mut()
                    .insert_cell(idx, InternalCell::new(PageId::new(child_page), child_max));
            }
            self.set_parent(child_page, parent_page)?;
            Ok(())
        } else {
            self.split_internal_and_insert(parent_page, child_page)
        }
    }

    fn split_internal_and_insert(&mut self, old_page: u32, new_child: u32) -> Result<()> {
        let child_max = self.max_key_of(new_child)?;
        let old_max_before_split = self.max_key_of(old_page)?;
        let (num_keys, right_child, was_root, parent) = {
            let view = self.pager.get_page(old_page)?.as_internal();
            (view.num_keys(), view.right_child(), view.is_root(), view.parent())
        };

        let mut pairs: Vec<(u32, u32)> = {
            let view = self.pager.get_page(old_page)?.as_internal();
            (0..num_keys).map(|i| (view.child_at(i), view.key_at(i))).collect()
        };
        let right_max = self.max_key_of(right_child)?;
        pairs.push((right_child, right_max));

        let insert_at = pairs.iter().position(|(_, k)| *k >= child_max).unwrap_or(pairs.len());
        pairs.insert(insert_at, (new_child, child_max));

        let total_keys = pairs.len() - 1;
        let split = total_keys / 2;
        // The middle key is promoted to the parent: it becomes the dynamic
        // (`right_child`-derived) bound of the left half's new subtree max,
        // and is never re-stored as an explicit cell in either child.
        let promoted_key = pairs[split].1;

        let left_children: Vec<u32> = pairs[0..=split].iter().map(|(c, _)| *c).collect();
        let left_keys: Vec<u32> = pairs[0..split].iter().map(|(_, k)| *k).collect();
        let left_right_child = *left_children.last().expect("at least one child");
        let left_cells: Vec<InternalCell> = left_children[..left_children.len() - 1]
            .iter()
            .zip(left_keys.iter())
            .map(|(&c, &k)| InternalCell::new(PageId::new(c), k))
            .collect();

        let right_children: Vec<u32> = pairs[split + 1..].iter().map(|(c, _)| *c).collect();
        let right_keys: Vec<u32> = pairs[split + 1..pairs.len() - 1].iter().map(|(_, k)| *k).collect();
        let right_right_child = *right_children.last().expect("at least one child");
        let right_cells: Vec<InternalCell> = right_children[..right_children.len() - 1]
            .iter()
            .zip(right_keys.iter())
            .map(|(&c, &k)| InternalCell::new(PageId::new(c), k))
            .collect();

        let new_page = self.pager.allocate_page()?;

        {
            let mut view = self.pager.get_page_mut(old_page)?.as_internal_mut();
            view.write_cells(&left_cells);
            view.set_right_child(left_right_child);
        }
        {
            let buf = self.pager.get_page_mut(new_page)?;
            let mut view = buf.as_internal_mut();
            view.init(false, parent);
            view.write_cells(&right_cells);
            view.set_right_child(right_right_child);
        }

        for &c in &left_children {
            self.set_parent(c, old_page)?;
        }
        for &c in &right_children {
            self.set_parent(c, new_page)?;
        }

        if was_root {
            self.create_new_root(new_page)?;
        } else {
            // Symmetric with the leaf-split case: the grandparent's routing
            // key that used to bound `old_page` at its pre-split max must
            // shrink to `old_page`'s new (left-half) max — which is the
            // promoted middle key, the true max of `old_page`'s new
            // `right_child` (`left_right_child`), not just its last explicit
            // routing key — before the right half is installed as a sibling.
            self.update_internal_node_key(parent, old_page, old_max_before_split, promoted_key)?;
            self.insert_child(parent, new_page)?;
        }
        Ok(())
    }

    /// Split the root, keeping the root's own page number stable at 0: the
    /// current root contents move to a freshly allocated page, and page 0
    /// is reinitialized as an internal node with two children.
    fn create_new_root(&mut self, right_child_page: u32) -> Result<()> {
        let left_child = self.pager.allocate_page()?;
        let root_copy = self.pager.get_page(PageId::ROOT.value())?.clone();
        *self.pager.get_page_mut(left_child)? = root_copy;

        match self.node_type_at(left_child)? {
            NodeType::Leaf => {
                let mut v = self.pager.get_page_mut(left_child)?.as_leaf_mut();
                v.set_is_root(false);
                v.set_parent(0);
            }
            NodeType::Internal => {
                {
                    let mut v = self.pager.get_page_mut(left_child)?.as_internal_mut();
                    v.set_is_root(false);
                    v.set_parent(0);
                }
                // left_child moved pages; its own children still point at the
                // old page number (0) as parent and must be corrected.
                let (cells, right) = {
                    let view = self.pager.get_page(left_child)?.as_internal();
                    (view.read_all_cells(), view.right_child())
                };
                for cell in cells {
                    self.set_parent(cell.child.value(), left_child)?;
                }
                self.set_parent(right, left_child)?;
            }
        }

        let left_max = self.max_key_of(left_child)?;
        {
            let mut view = self.pager.get_page_mut(PageId::ROOT.value())?.as_internal_mut();
            view.init(true, 0);
            view.set_right_child(right_child_page);
            view.insert_cell(0, InternalCell::new(PageId::new(left_child), left_max));
        }
        self.set_parent(right_child_page, 0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PagerConfig;

    fn small_tree() -> BTree {
        let pager = Pager::new(PagerConfig::new(64));
        BTree::open(pager, BTreeConfig::new(3, 3)).unwrap()
    }

    #[test]
    fn test_empty_tree_start() {
        let mut tree = small_tree();
        let cursor = tree.start().unwrap();
        assert!(cursor.end_of_table());
    }

    #[test]
    fn test_single_insert_and_find() {
        let mut tree = small_tree();
        assert!(tree.insert(42, b"v").unwrap());
        let mut cursor = tree.find(42).unwrap();
        assert!(!cursor.end_of_table());
        assert_eq!(cursor.value().unwrap(), b"v");
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut tree = small_tree();
        assert!(tree.insert(1, b"a").unwrap());
        assert!(!tree.insert(1, b"b").unwrap());
        let mut cursor = tree.find(1).unwrap();
        assert_eq!(cursor.value().unwrap(), b"a");
    }

    #[test]
    fn test_sequential_inserts_iterate_in_order() {
        let mut tree = BTree::with_default_config(Pager::with_default_config()).unwrap();
        for i in 0..100u32 {
            let value = format!("val{i}");
            assert!(tree.insert(i, value.as_bytes()).unwrap());
        }
        let mut cursor = tree.start().unwrap();
        let mut count = 0;
        loop {
            if cursor.end_of_table() {
                break;
            }
            let key = cursor.key().unwrap();
            let value = cursor.value().unwrap();
            assert_eq!(value, format!("val{key}").into_bytes());
            count += 1;
            cursor.advance().unwrap();
        }
        assert_eq!(count, 100);
    }

    #[test]
    fn test_forced_leaf_and_internal_splits() {
        let mut tree = small_tree();
        for i in 0..200u32 {
            assert!(tree.insert(i, format!("v{i}").as_bytes()).unwrap());
        }
        let mut cursor = tree.start().unwrap();
        for expected in 0..200u32 {
            assert!(!cursor.end_of_table());
            assert_eq!(cursor.key().unwrap(), expected);
            cursor.advance().unwrap();
        }
        assert!(cursor.end_of_table());
    }

    #[test]
    fn test_find_on_missing_key_returns_insertion_point() {
        let mut tree = small_tree();
        tree.insert(42, b"v").unwrap();
        let cursor = tree.find(41).unwrap();
        assert_eq!(cursor.cell_num(), 0);
        let cursor = tree.find(43).unwrap();
        assert_eq!(cursor.cell_num(), 1);
    }
}
