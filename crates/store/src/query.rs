use common::CategoryId;

/// Filter and paging options shared by the list queries.
///
/// A `page` or `per` of zero disables paging and returns every match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub page: u32,
    pub per: u32,
    /// Case-insensitive substring matched against the name-like columns.
    pub term: Option<String>,
    /// Restricts product listings to one category.
    pub category_id: Option<CategoryId>,
}

impl ListFilter {
    /// Creates a paged filter.
    pub fn paged(page: u32, per: u32) -> Self {
        Self {
            page,
            per,
            ..Default::default()
        }
    }

    /// Sets the search term. Blank terms are ignored.
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.term = if term.trim().is_empty() {
            None
        } else {
            Some(term.trim().to_string())
        };
        self
    }

    pub fn with_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    /// Returns `(limit, offset)` when paging is enabled.
    pub fn limit_offset(&self) -> Option<(i64, i64)> {
        if self.page == 0 || self.per == 0 {
            return None;
        }
        let per = i64::from(self.per);
        Some((per, (i64::from(self.page) - 1) * per))
    }

    /// Returns the `ILIKE` pattern for the search term.
    pub(crate) fn like_pattern(&self) -> Option<String> {
        self.term.as_ref().map(|t| format!("%{t}%"))
    }

    /// Case-insensitive match used by the in-memory store.
    pub(crate) fn matches_term<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> bool {
        match &self.term {
            None => true,
            Some(term) => {
                let needle = term.to_lowercase();
                fields
                    .into_iter()
                    .any(|f| f.to_lowercase().contains(&needle))
            }
        }
    }

    /// Applies paging to an already filtered, ordered list.
    pub(crate) fn paginate<T>(&self, rows: Vec<T>) -> Vec<T> {
        match self.limit_offset() {
            None => rows,
            Some((limit, offset)) => rows
                .into_iter()
                .skip(offset as usize)
                .take(limit as usize)
                .collect(),
        }
    }
}
