//! Page and page-size normalization shared by the search service and the
//! index repository.

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Clamp the page number to the first page when it is not positive.
pub fn normalize_page(page: i64) -> i64 {
    page.max(1)
}

/// Size accepted by the search service: anything outside `1..=MAX_PAGE_SIZE`
/// collapses to the default.
pub fn bounded_page_size(size: i64) -> i64 {
    if (1..=MAX_PAGE_SIZE).contains(&size) {
        size
    } else {
        DEFAULT_PAGE_SIZE
    }
}

/// Size guard used by the repository, which only rejects degenerate values.
pub fn positive_page_size(size: i64) -> i64 {
    if size < 1 { DEFAULT_PAGE_SIZE } else { size }
}

/// Zero-based row offset of the first hit on `page`.
pub fn offset(page: i64, size: i64) -> i64 {
    (page - 1).saturating_mul(size)
}

/// `ceil(total / size)`; `size` must be at least 1.
pub fn total_pages(total: i64, size: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    let size = size.max(1);
    total / size + i64::from(total % size > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(23, 10), 3);
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(0, 10), 0);
    }

    #[test]
    fn bounded_size_collapses_out_of_range() {
        assert_eq!(bounded_page_size(0), DEFAULT_PAGE_SIZE);
        assert_eq!(bounded_page_size(101), DEFAULT_PAGE_SIZE);
        assert_eq!(bounded_page_size(-3), DEFAULT_PAGE_SIZE);
        assert_eq!(bounded_page_size(100), 100);
        assert_eq!(bounded_page_size(1), 1);
    }

    #[test]
    fn positive_size_keeps_large_values() {
        assert_eq!(positive_page_size(500), 500);
        assert_eq!(positive_page_size(0), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn page_and_offset() {
        assert_eq!(normalize_page(0), 1);
        assert_eq!(normalize_page(-4), 1);
        assert_eq!(offset(1, 10), 0);
        assert_eq!(offset(3, 25), 50);
    }
}
