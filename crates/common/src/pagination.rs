//! Page metadata returned alongside list responses.

use serde::{Deserialize, Serialize};

/// Default page size used when a caller asks for fewer than one row per page.
pub const DEFAULT_PER: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub count: u64,
    pub next_page: Option<u32>,
    pub num_pages: u32,
    pub page: u32,
    pub per: u32,
    pub prev_page: Option<u32>,
}

impl Pagination {
    /// Builds page metadata for `count` total rows.
    ///
    /// An empty result still reports a single page.
    pub fn new(count: u64, page: u32, per: u32) -> Self {
        let per = if per < 1 { DEFAULT_PER } else { per };

        let num_pages = if count == 0 {
            1
        } else {
            u32::try_from(count.div_ceil(u64::from(per))).unwrap_or(u32::MAX)
        };

        Self {
            count,
            next_page: (page < num_pages).then(|| page + 1),
            num_pages,
            page,
            per,
            prev_page: (page > 1).then(|| page - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_of_several_pages() {
        let p = Pagination::new(45, 1, 20);
        assert_eq!(p.num_pages, 3);
        assert_eq!(p.next_page, Some(2));
        assert_eq!(p.prev_page, None);
    }

    #[test]
    fn last_page_has_no_next() {
        let p = Pagination::new(40, 2, 20);
        assert_eq!(p.num_pages, 2);
        assert_eq!(p.next_page, None);
        assert_eq!(p.prev_page, Some(1));
    }

    #[test]
    fn empty_result_is_one_page() {
        let p = Pagination::new(0, 1, 20);
        assert_eq!(p.num_pages, 1);
        assert_eq!(p.next_page, None);
    }

    #[test]
    fn zero_per_falls_back_to_default() {
        let p = Pagination::new(25, 1, 0);
        assert_eq!(p.per, DEFAULT_PER);
        assert_eq!(p.num_pages, 3);
    }
}
