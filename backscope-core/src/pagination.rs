//! Fixed-size page windowing shared by every table view.
//!
//! The paginator never owns the items; it tracks a page cursor over a
//! sequence of known length and hands out the current window as a range or a
//! slice. It is keyed by a source identity so that switching tabs (or table
//! kinds) snaps back to page 1.

use std::ops::Range;

/// Rows per page in the trade and signal tables.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Page cursor over a sequence identified by `K`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator<K = ()> {
    key: Option<K>,
    len: usize,
    page_size: usize,
    current_page: usize,
}

impl Paginator<()> {
    /// Paginator over an anonymous sequence of `len` items.
    pub fn for_len(len: usize, page_size: usize) -> Self {
        let mut pager = Self::new(page_size);
        pager.sync((), len);
        pager
    }
}

impl<K: PartialEq> Paginator<K> {
    /// Empty paginator. A page size of zero is treated as one.
    pub fn new(page_size: usize) -> Self {
        Self {
            key: None,
            len: 0,
            page_size: page_size.max(1),
            current_page: 1,
        }
    }

    /// Bind to a sequence. A new key resets to page 1; the same key with a
    /// different length keeps the page, clamped into range.
    pub fn sync(&mut self, key: K, len: usize) {
        if self.key.as_ref() != Some(&key) {
            self.key = Some(key);
            self.current_page = 1;
        }
        self.len = len;
        self.current_page = self.current_page.clamp(1, self.total_pages());
    }

    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// 1-indexed.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// `ceil(len / page_size)`, never less than 1.
    pub fn total_pages(&self) -> usize {
        self.len.div_ceil(self.page_size).max(1)
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn next(&mut self) {
        if self.has_next() {
            self.current_page += 1;
        }
    }

    pub fn previous(&mut self) {
        if self.has_previous() {
            self.current_page -= 1;
        }
    }

    /// Index range of the current page within the bound sequence.
    pub fn current_range(&self) -> Range<usize> {
        let start = ((self.current_page - 1) * self.page_size).min(self.len);
        let end = (start + self.page_size).min(self.len);
        start..end
    }

    /// Window of `items` for the current page. `items` should be the
    /// sequence last passed to [`sync`](Self::sync); a shorter slice is
    /// clamped rather than panicking.
    pub fn current_items<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.current_range();
        let end = range.end.min(items.len());
        let start = range.start.min(end);
        &items[start..end]
    }
}
