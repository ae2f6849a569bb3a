//! Pager: a fixed-capacity, memory-only array of page buffers.
//!
//! There is no backing file, no eviction, and no free list. A page is
//! allocated lazily, the first time it's requested, and its number is never
//! reused — the pager only ever grows its high-water mark. This mirrors a
//! disk pager's addressing model without any of its I/O.

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::types::PagerConfig;

/// Owns every page the tree has ever touched, addressed by page number.
pub struct Pager {
    pages: Vec<Option<PageBuf>>,
    num_pages: u32,
    capacity: u32,
}

impl Pager {
    /// Create a pager with the given capacity, with no pages yet allocated
    pub fn new(config: PagerConfig) -> Self {
        let mut pages = Vec::with_capacity(config.capacity as usize);
        pages.resize_with(config.capacity as usize, || None);
        Self {
            pages,
            num_pages: 0,
            capacity: config.capacity,
        }
    }

    /// Create a pager with the default capacity (100 pages, matching the
    /// reference `TABLE_MAX_PAGES`)
    pub fn with_default_config() -> Self {
        Self::new(PagerConfig::default())
    }

    /// Number of page slots this pager can address
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Highest page number ever handed out, plus one; the count of pages
    /// that exist so far
    pub fn num_pages(&self) -> u32 {
        self.num_pages
    }

    /// The next page number `allocate_page` would hand out
    pub fn next_page_num(&self) -> u32 {
        self.num_pages
    }

    fn check_bounds(&self, page_num: u32) -> Result<()> {
        if page_num >= self.capacity {
            return Err(StorageError::PageLimitExceeded {
                requested: page_num,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Borrow a page, zero-allocating it on first access. Bumps the
    /// high-water mark if this page number hasn't been seen before.
    pub fn get_page(&mut self, page_num: u32) -> Result<&PageBuf> {
        self.check_bounds(page_num)?;
        let idx = page_num as usize;
        if self.pages[idx].is_none() {
            self.pages[idx] = Some(PageBuf::new());
        }
        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }
        Ok(self.pages[idx].as_ref().expect("just allocated"))
    }

    /// Mutably borrow a page, zero-allocating it on first access
    pub fn get_page_mut(&mut self, page_num: u32) -> Result<&mut PageBuf> {
        self.check_bounds(page_num)?;
        let idx = page_num as usize;
        if self.pages[idx].is_none() {
            self.pages[idx] = Some(PageBuf::new());
        }
        if page_num >= self.num_pages {
            self.num_pages = page_num + 1;
        }
        Ok(self.pages[idx].as_mut().expect("just allocated"))
    }

    /// Reserve the next unused page number and zero-allocate it
    pub fn allocate_page(&mut self) -> Result<u32> {
        let page_num = self.num_pages;
        self.get_page_mut(page_num)?;
        Ok(page_num)
    }

    /// Drop every page buffer. There is nothing to flush since nothing was
    /// ever written to disk; this exists so callers have a single place to
    /// call at teardown regardless of what the storage backend ends up being.
    pub fn close(&mut self) {
        for slot in &mut self.pages {
            *slot = None;
        }
        self.num_pages = 0;
    }
}
