//! Cell encoding and decoding.
//!
//! Leaf cells are `[key:4][value_size:4][value:value_size]`, packed forward
//! from the header with no padding and no cell-pointer indirection. Internal
//! cells are a fixed `[child:4][key:4]`. All fields little-endian.

use crate::types::{PageId, INTERNAL_CELL_SIZE, LEAF_CELL_PREFIX_SIZE};

/// A decoded leaf cell: key, and a view of its value bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCell {
    pub key: u32,
    pub value: Vec<u8>,
}

impl LeafCell {
    pub fn new(key: u32, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    /// Total serialized size of this cell: prefix plus payload
    pub fn encoded_size(&self) -> usize {
        LEAF_CELL_PREFIX_SIZE + self.value.len()
    }

    /// Encode this cell into a freshly allocated buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        buf.extend_from_slice(&self.key.to_le_bytes());
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.value);
        buf
    }

    /// Decode a cell starting at the front of `bytes`.
    ///
    /// Returns the cell and the number of bytes it consumed.
    pub fn decode(bytes: &[u8]) -> Option<(Self, usize)> {
        if bytes.len() < LEAF_CELL_PREFIX_SIZE {
            return None;
        }
        let key = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let value_size = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let total = LEAF_CELL_PREFIX_SIZE + value_size;
        if bytes.len() < total {
            return None;
        }
        let value = bytes[LEAF_CELL_PREFIX_SIZE..total].to_vec();
        Some((Self::new(key, value), total))
    }

    /// Just the key at the front of an encoded cell, without copying its value
    pub fn peek_key(bytes: &[u8]) -> Option<u32> {
        if bytes.len() < 4 {
            return None;
        }
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Just the value size at the front of an encoded cell
    pub fn peek_value_size(bytes: &[u8]) -> Option<usize> {
        if bytes.len() < LEAF_CELL_PREFIX_SIZE {
            return None;
        }
        Some(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize)
    }
}

/// A fixed-width internal (routing) cell: `[child][key]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalCell {
    pub child: PageId,
    pub key: u32,
}

impl InternalCell {
    pub fn new(child: PageId, key: u32) -> Self {
        Self { child, key }
    }

    pub fn encode(&self) -> [u8; INTERNAL_CELL_SIZE] {
        let mut buf = [0u8; INTERNAL_CELL_SIZE];
        buf[0..4].copy_from_slice(&self.child.value().to_le_bytes());
        buf[4..8].copy_from_slice(&self.key.to_le_bytes());
        buf
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < INTERNAL_CELL_SIZE {
            return None;
        }
        let child = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let key = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Some(Self::new(PageId::new(child), key))
    }
}
