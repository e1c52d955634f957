//! Pagination and sorting parameters for list endpoints.
//!
//! Query values arrive as raw strings. Anything unparsable or out of range
//! falls back to a default instead of failing the request.

use std::cmp::Ordering;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// `page` below 1 or unparsable becomes 1; `limit` below 1 or
    /// unparsable becomes 10 and is capped at 100.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .map(|p| p.min(u32::MAX as i64) as u32)
            .unwrap_or(DEFAULT_PAGE);

        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .map(|l| l.min(MAX_LIMIT as i64) as u32)
            .unwrap_or(DEFAULT_LIMIT);

        Self { page, limit }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }

    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.limit as usize)
    }

    /// Take this page's window out of an already sorted list.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset())
            .take(self.limit as usize)
            .collect()
    }
}

/// A field a list can be ordered by.
pub trait SortField: Copy + Sized {
    const DEFAULT: Self;

    fn from_name(name: &str) -> Option<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookSort {
    Author,
    CreatedAt,
    Title,
}

impl SortField for BookSort {
    const DEFAULT: Self = BookSort::CreatedAt;

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "author" => Some(BookSort::Author),
            "createdAt" => Some(BookSort::CreatedAt),
            "title" => Some(BookSort::Title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewSort {
    CreatedAt,
    Rating,
}

impl SortField for ReviewSort {
    const DEFAULT: Self = ReviewSort::CreatedAt;

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "createdAt" => Some(ReviewSort::CreatedAt),
            "rating" => Some(ReviewSort::Rating),
            _ => None,
        }
    }
}

/// A whitelisted sort, written `field` or `-field` for descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder<F> {
    pub descending: bool,
    pub field: F,
}

impl<F: SortField> Default for SortOrder<F> {
    fn default() -> Self {
        Self {
            descending: true,
            field: F::DEFAULT,
        }
    }
}

impl<F: SortField> SortOrder<F> {
    /// Unknown fields fall back to newest first.
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
            return Self::default();
        };

        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        match F::from_name(name) {
            Some(field) => Self { descending, field },
            None => Self::default(),
        }
    }

    pub fn apply(&self, ordering: Ordering) -> Ordering {
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_defaults() {
        assert_eq!(Page::parse(None, None), Page { page: 1, limit: 10 });
        assert_eq!(
            Page::parse(Some("abc"), Some("")),
            Page { page: 1, limit: 10 }
        );
        assert_eq!(
            Page::parse(Some("0"), Some("-5")),
            Page { page: 1, limit: 10 }
        );
    }

    #[test]
    fn test_page_limit_is_capped() {
        assert_eq!(
            Page::parse(Some("3"), Some("500")),
            Page { page: 3, limit: 100 }
        );
    }

    #[test]
    fn test_page_window() {
        let page = Page { page: 2, limit: 3 };
        assert_eq!(page.offset(), 3);
        assert_eq!(page.slice((0..8).collect()), vec![3, 4, 5]);
        assert_eq!(page.total_pages(8), 3);
        assert_eq!(page.total_pages(0), 0);
    }

    #[test]
    fn test_sort_parse() {
        let sort = SortOrder::<BookSort>::parse(Some("title"));
        assert_eq!(sort.field, BookSort::Title);
        assert!(!sort.descending);

        let sort = SortOrder::<BookSort>::parse(Some("-author"));
        assert_eq!(sort.field, BookSort::Author);
        assert!(sort.descending);

        assert_eq!(
            SortOrder::<BookSort>::parse(Some("password")),
            SortOrder::default()
        );
        assert_eq!(
            SortOrder::<ReviewSort>::parse(Some("title")),
            SortOrder {
                descending: true,
                field: ReviewSort::CreatedAt
            }
        );
    }
}
