use std::ops::Range;

pub const DEFAULT_LIMIT: usize = 20;

/// 1-based page over `total` items. Out-of-range pages are clamped, never
/// reported as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::new(DEFAULT_LIMIT)
    }
}

impl Pagination {
    pub fn new(limit: usize) -> Self {
        Pagination {
            page: 1,
            limit,
            total: 0,
        }
    }

    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_LIMIT
        } else {
            self.limit
        }
    }

    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.effective_limit()).max(1)
    }

    pub fn with_total(self, total: usize) -> Self {
        Pagination { total, ..self }
    }

    /// Page 1 when the current page is outside `[1, page_count]`.
    pub fn clamped(self) -> Self {
        let page = if self.page < 1 || self.page > self.page_count() {
            1
        } else {
            self.page
        };
        Pagination {
            page,
            limit: self.effective_limit(),
            ..self
        }
    }

    pub fn with_limit(self, limit: usize) -> Self {
        Pagination {
            page: 1,
            limit,
            ..self
        }
    }

    /// Ignores pages outside `[1, page_count]`.
    pub fn go_to(self, page: usize) -> Self {
        if page < 1 || page > self.page_count() {
            return self;
        }
        Pagination { page, ..self }
    }

    /// Index range of the current page, already bounded by `total`.
    pub fn bounds(&self) -> Range<usize> {
        let limit = self.effective_limit();
        let start = self.page.saturating_sub(1).saturating_mul(limit).min(self.total);
        let end = start.saturating_add(limit).min(self.total);
        start..end
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count()
    }

    /// Page numbers within `radius` of the current page.
    pub fn window(&self, radius: usize) -> Vec<usize> {
        let last = self.page_count();
        let first = self.page.saturating_sub(radius).max(1);
        let end = self.page.saturating_add(radius).min(last);
        (first..=end).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_never_drops_below_one() {
        assert_eq!(Pagination::new(20).page_count(), 1);
        assert_eq!(Pagination::new(10).with_total(25).page_count(), 3);
        assert_eq!(Pagination::new(10).with_total(30).page_count(), 3);
    }

    #[test]
    fn changing_limit_resets_page() {
        let p = Pagination::new(10).with_total(25).go_to(3);
        assert_eq!(p.page, 3);
        let p = p.with_limit(50);
        assert_eq!(p.page, 1);
        assert_eq!(p.bounds(), 0..25);
    }

    #[test]
    fn go_to_ignores_out_of_range_pages() {
        let p = Pagination::new(10).with_total(25);
        assert_eq!(p.go_to(0).page, 1);
        assert_eq!(p.go_to(4).page, 1);
        assert_eq!(p.go_to(2).page, 2);
    }

    #[test]
    fn overflowing_page_clamps_to_first() {
        let p = Pagination {
            page: 10,
            limit: 20,
            total: 5,
        }
        .clamped();
        assert_eq!(p.page, 1);
        assert_eq!(p.bounds(), 0..5);
    }

    #[test]
    fn zero_limit_uses_default() {
        let p = Pagination {
            page: 1,
            limit: 0,
            total: 45,
        };
        assert_eq!(p.page_count(), 3);
        assert_eq!(p.clamped().limit, DEFAULT_LIMIT);
    }

    #[test]
    fn last_page_is_partial() {
        let p = Pagination::new(10).with_total(25).go_to(3);
        assert_eq!(p.bounds(), 20..25);
        assert!(p.has_prev());
        assert!(!p.has_next());
    }

    #[test]
    fn window_is_bounded() {
        let p = Pagination::new(10).with_total(95).go_to(2);
        assert_eq!(p.window(2), vec![1, 2, 3, 4]);
        let p = p.go_to(10);
        assert_eq!(p.window(2), vec![8, 9, 10]);
    }
}
