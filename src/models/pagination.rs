//! Pagination parameters and paged results shared by every list endpoint

use serde::{Deserialize, Serialize};

/// Page size used when the caller does not pass `limit`
pub const DEFAULT_LIMIT: u32 = 20;

/// Largest page size a caller may request
pub const MAX_LIMIT: u32 = 100;

/// Pagination parameters for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub limit: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListParams {
    /// Create new pagination parameters, clamping out-of-range values
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Calculate the offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.limit as i64
    }

    /// Get the limit for database queries
    pub fn limit(&self) -> i64 {
        self.limit as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    /// Items in the current page
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    /// Current page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub limit: u32,
    pub total_pages: u32,
}

fn page_count(total: i64, limit: u32) -> u32 {
    if limit == 0 || total <= 0 {
        return 0;
    }
    ((total as u64 + limit as u64 - 1) / limit as u64) as u32
}

impl<T> PagedResult<T> {
    /// Create a new paginated result
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            limit: params.limit,
            total_pages: page_count(total, params.limit),
        }
    }

    /// Check if there is a next page
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Transform the items while keeping the paging metadata
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_list_params_clamp() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, MAX_LIMIT);

        let params = ListParams::new(3, 0);
        assert_eq!(params.limit, 1);
        assert_eq!(params.offset(), 2);
    }

    #[test]
    fn test_offset() {
        assert_eq!(ListParams::new(1, 20).offset(), 0);
        assert_eq!(ListParams::new(4, 25).offset(), 75);
    }

    #[test]
    fn test_total_pages() {
        let params = ListParams::new(1, 10);
        assert_eq!(PagedResult::<i32>::new(vec![], 0, &params).total_pages, 0);
        assert_eq!(PagedResult::<i32>::new(vec![], 10, &params).total_pages, 1);
        assert_eq!(PagedResult::<i32>::new(vec![], 11, &params).total_pages, 2);
    }

    #[test]
    fn test_has_next() {
        let result = PagedResult::new(vec![1, 2], 5, &ListParams::new(2, 2));
        assert!(result.has_next());
        let result = PagedResult::new(vec![5], 5, &ListParams::new(3, 2));
        assert!(!result.has_next());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Pages cover the whole set exactly once
        #[test]
        fn pages_cover_total(total in 0i64..1000, limit in 1u32..=100) {
            let first = PagedResult::<()>::new(vec![], total, &ListParams::new(1, limit));
            let pages = first.total_pages as i64;
            prop_assert!(pages * limit as i64 >= total);
            prop_assert!((pages - 1).max(0) * (limit as i64) < total.max(1));
        }
    }
}
