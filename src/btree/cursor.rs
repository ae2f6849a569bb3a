//! Cursor for in-order iteration over leaf cells.
//!
//! Unlike a stack-based cursor over an unchained tree, a B+ tree cursor only
//! ever needs a single `(page_num, cell_num)` position: once it falls off the
//! end of a leaf, it follows that leaf's `next_leaf` pointer rather than
//! climbing back up through parents.

use crate::btree::BTree;
use crate::error::Result;

/// A cursor positioned at a single leaf cell, or past the last cell of the
/// rightmost leaf.
///
/// Holding `&mut BTree` for the cursor's whole lifetime means no insertion
/// can happen while a cursor is live — the borrow checker enforces the "no
/// concurrent mutation during a scan" rule for free.
pub struct Cursor<'a> {
    tree: &'a mut BTree,
    page_num: u32,
    cell_num: u16,
    end_of_table: bool,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(tree: &'a mut BTree, page_num: u32, cell_num: u16, end_of_table: bool) -> Self {
        Self {
            tree,
            page_num,
            cell_num,
            end_of_table,
        }
    }

    /// Whether the cursor has run off the end of the table
    pub fn end_of_table(&self) -> bool {
        self.end_of_table
    }

    /// Page number of the leaf the cursor currently points into
    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    /// Cell index within the current leaf
    pub fn cell_num(&self) -> u16 {
        self.cell_num
    }

    /// The key at the cursor's current position
    pub fn key(&mut self) -> Result<u32> {
        let leaf = self.tree.pager_mut().get_page(self.page_num)?.as_leaf();
        Ok(leaf.key_at(self.cell_num))
    }

    /// Copy the value at the cursor's current position into `buffer`.
    ///
    /// `out_size` always receives the value's true length, even if `buffer`
    /// is too small to hold it — in that case nothing is copied and the
    /// caller can retry with a bigger buffer.
    pub fn get_value(&mut self, buffer: &mut [u8], out_size: &mut usize) -> Result<()> {
        let leaf = self.tree.pager_mut().get_page(self.page_num)?.as_leaf();
        let size = leaf.value_size_at(self.cell_num);
        *out_size = size;
        if buffer.len() >= size {
            buffer[..size].copy_from_slice(leaf.value_at(self.cell_num));
        }
        Ok(())
    }

    /// Convenience allocator over [`Cursor::get_value`]
    pub fn value(&mut self) -> Result<Vec<u8>> {
        let leaf = self.tree.pager_mut().get_page(self.page_num)?.as_leaf();
        Ok(leaf.value_at(self.cell_num).to_vec())
    }

    /// Advance to the next cell, following the leaf chain when the current
    /// leaf is exhausted. Sets `end_of_table` once the chain runs out.
    pub fn advance(&mut self) -> Result<()> {
        let (num_cells, next_leaf) = {
            let leaf = self.tree.pager_mut().get_page(self.page_num)?.as_leaf();
            (leaf.num_cells(), leaf.next_leaf())
        };
        self.cell_num += 1;
        if self.cell_num < num_cells {
            return Ok(());
        }
        if next_leaf == 0 {
            self.end_of_table = true;
            return Ok(());
        }
        self.page_num = next_leaf;
        self.cell_num = 0;
        let empty = self.tree.pager_mut().get_page(self.page_num)?.as_leaf().num_cells() == 0;
        self.end_of_table = empty;
        Ok(())
    }
}
