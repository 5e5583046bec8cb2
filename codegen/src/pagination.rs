use serde::{Deserialize, Serialize};

/// Page size that disables pagination for every list operation.
pub const ALL_ROWS: i64 = -1;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default = "first_page")]
    pub current_page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn first_page() -> u64 {
    1
}

fn default_page_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            current_page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(current_page: u64, page_size: i64) -> Self {
        Self {
            current_page,
            page_size,
        }
    }

    pub fn all() -> Self {
        Self::new(1, ALL_ROWS)
    }

    /// `None` means every row. Otherwise `(zero-based page index, page size)`.
    pub fn window(&self) -> Option<(u64, u64)> {
        if self.page_size == ALL_ROWS {
            return None;
        }
        let size = if self.page_size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size.min(MAX_PAGE_SIZE)
        };
        Some((self.current_page.max(1) - 1, size as u64))
    }

    /// Row offset of a window, or `None` when it lies past any addressable row.
    pub fn offset_of(index: u64, size: u64) -> Option<u64> {
        index.checked_mul(size).filter(|o| *o <= i64::MAX as u64)
    }

    /// Slices an already-materialized, already-ordered list.
    pub fn apply<T>(&self, items: Vec<T>) -> Page<T> {
        let total = items.len() as u64;
        match self.window() {
            None => Page::everything(items),
            Some((index, size)) => {
                let list = match Self::offset_of(index, size) {
                    Some(offset) if offset < total => items
                        .into_iter()
                        .skip(offset as usize)
                        .take(size as usize)
                        .collect(),
                    _ => Vec::new(),
                };
                Page {
                    list,
                    total,
                    current_page: index + 1,
                    page_size: size as i64,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub list: Vec<T>,
    pub total: u64,
    pub current_page: u64,
    pub page_size: i64,
}

impl<T> Page<T> {
    pub fn everything(list: Vec<T>) -> Self {
        Self {
            total: list.len() as u64,
            list,
            current_page: 1,
            page_size: ALL_ROWS,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            list: self.list.into_iter().map(f).collect(),
            total: self.total,
            current_page: self.current_page,
            page_size: self.page_size,
        }
    }
}
