//! FILENAME: grid-engine/src/pagination.rs
//! PURPOSE: Client-side paging over a row list.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Zero-based page cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Pagination {
    pub page_size: usize,
    pub current_page: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination {
            page_size: DEFAULT_PAGE_SIZE,
            current_page: 0,
        }
    }
}

impl Pagination {
    pub fn new(page_size: usize) -> Self {
        Pagination {
            page_size: page_size.max(1),
            current_page: 0,
        }
    }

    /// At least one page, even for an empty list.
    pub fn page_count(&self, total_rows: usize) -> usize {
        let size = self.page_size.max(1);
        total_rows.div_ceil(size).max(1)
    }

    /// Half-open row range `[start, end)` of the current page.
    pub fn page_bounds(&self, total_rows: usize) -> (usize, usize) {
        let size = self.page_size.max(1);
        let page = self.current_page.min(self.page_count(total_rows) - 1);
        let start = (page * size).min(total_rows);
        let end = (start + size).min(total_rows);
        (start, end)
    }

    pub fn page_slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let (start, end) = self.page_bounds(rows.len());
        &rows[start..end]
    }

    /// Changing the page size returns to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.current_page = 0;
    }

    /// Moves to a page, clamped to the last one.
    pub fn go_to_page(&mut self, page: usize, total_rows: usize) {
        self.current_page = page.min(self.page_count(total_rows) - 1);
    }

    pub fn next_page(&mut self, total_rows: usize) {
        self.go_to_page(self.current_page + 1, total_rows);
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.saturating_sub(1);
    }
}
