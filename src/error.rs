//! Error types for the storage engine.

use thiserror::Error;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system
    ///
    /// Unused by the current memory-only pager; kept as the seam a future
    /// disk-backed `Pager` would hang off of without changing this type.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `get_page` was asked for a page number at or beyond the pager's capacity
    #[error("page {requested} exceeds pager capacity of {capacity} pages")]
    PageLimitExceeded { requested: u32, capacity: u32 },

    /// A traversal observed a node that cannot be part of a well-formed tree
    #[error("corrupt node at page {page_num}: {detail}")]
    CorruptNode { page_num: u32, detail: String },
}

impl StorageError {
    /// Create a corrupt-node error with a message
    pub fn corrupt_node(page_num: u32, detail: impl Into<String>) -> Self {
        Self::CorruptNode {
            page_num,
            detail: detail.into(),
        }
    }
}
