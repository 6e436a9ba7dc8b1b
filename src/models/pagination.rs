//! Pagination types shared by list endpoints

use serde::{Deserialize, Serialize};

/// Page size used when none (or an out-of-range one) is requested
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Largest accepted page size
pub const MAX_PAGE_SIZE: u32 = 100;

/// Pagination parameters (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    pub page: u32,
    pub page_size: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListParams {
    /// Normalize raw query values.
    ///
    /// A page below 1 becomes 1. A page size outside `1..=MAX_PAGE_SIZE`
    /// falls back to the default rather than being clamped.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        let page = match page {
            Some(p) if p >= 1 => p.min(u32::MAX as i64) as u32,
            _ => 1,
        };
        let page_size = match page_size {
            Some(s) if (1..=MAX_PAGE_SIZE as i64).contains(&s) => s as u32,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { page, page_size }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            page_size: params.page_size,
        }
    }

    /// ceil(total / page_size)
    pub fn total_pages(&self) -> i64 {
        if self.page_size == 0 {
            return 0;
        }
        let size = self.page_size as i64;
        (self.total + size - 1) / size
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_defaults() {
        let params = ListParams::new(None, None);
        assert_eq!(params, ListParams::default());
        assert_eq!(params.offset(), 0);
        assert_eq!(params.limit(), 20);
    }

    #[test]
    fn test_out_of_range_values() {
        assert_eq!(ListParams::new(Some(0), Some(0)), ListParams::default());
        assert_eq!(ListParams::new(Some(-3), Some(101)), ListParams::default());
        assert_eq!(ListParams::new(Some(3), Some(100)).page_size, 100);
    }

    #[test]
    fn test_offset() {
        let params = ListParams::new(Some(3), Some(10));
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn test_total_pages() {
        let params = ListParams::new(Some(1), Some(10));
        assert_eq!(PagedResult::<i32>::new(vec![], 0, &params).total_pages(), 0);
        assert_eq!(PagedResult::<i32>::new(vec![], 10, &params).total_pages(), 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 11, &params).total_pages(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn property_normalized_params_in_range(page in any::<i64>(), size in any::<i64>()) {
            let params = ListParams::new(Some(page), Some(size));
            prop_assert!(params.page >= 1);
            prop_assert!((1..=MAX_PAGE_SIZE).contains(&params.page_size));
            prop_assert!(params.offset() >= 0);
        }

        #[test]
        fn property_total_pages_is_ceiling(total in 0i64..10_000, size in 1i64..=100) {
            let params = ListParams::new(Some(1), Some(size));
            let pages = PagedResult::<()>::new(vec![], total, &params).total_pages();
            prop_assert!(pages * size >= total);
            prop_assert!((pages - 1).max(0) * size < total.max(1));
        }
    }
}
