//! Pagination types.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_number: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number,
            page_size,
        }
    }

    /// Store-level window for this page.
    pub fn window(&self) -> PageWindow {
        PageWindow {
            skip: u64::from(self.page_number.saturating_sub(1)) * u64::from(self.page_size),
            take: u64::from(self.page_size),
        }
    }
}

/// Offset/limit pair understood by stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub take: u64,
}

impl PageWindow {
    /// Every row of the scope.
    pub const ALL: PageWindow = PageWindow {
        skip: 0,
        take: i64::MAX as u64,
    };
}

/// One page of results plus totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        let total_pages = if request.page_size == 0 {
            0
        } else {
            total_count.div_ceil(u64::from(request.page_size))
        };
        Self {
            items,
            page_number: request.page_number,
            page_size: request.page_size,
            total_count,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page_number: self.page_number,
            page_size: self.page_size,
            total_count: self.total_count,
            total_pages: self.total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        u64::from(self.page_number) < self.total_pages
    }
}
