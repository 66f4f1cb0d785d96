//! Pagination request/response types for product listings.

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Validated product listing request.
///
/// `name` is an exact-match filter; a blank name means "no filter".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    page_num: u32,
    page_size: u32,
    name: Option<String>,
}

impl ProductQuery {
    pub fn new(page_num: u32, page_size: u32, name: Option<String>) -> DomainResult<Self> {
        if page_num < 1 {
            return Err(DomainError::validation("page number must be at least 1"));
        }

        if page_size < 1 {
            return Err(DomainError::validation("page size must be at least 1"));
        }

        if page_size > MAX_PAGE_SIZE {
            return Err(DomainError::validation(format!(
                "page size must be at most {MAX_PAGE_SIZE}"
            )));
        }

        let name = name.filter(|n| !n.trim().is_empty());

        Ok(Self {
            page_num,
            page_size,
            name,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.trim().is_empty() { None } else { Some(name) };
        self
    }

    pub fn page_num(&self) -> u32 {
        self.page_num
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `(page_num - 1) * page_size`.
    pub fn offset(&self) -> usize {
        (self.page_num as usize - 1) * self.page_size as usize
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }

    /// Exact value equality against the filter (always true without one).
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.name.as_deref().is_none_or(|wanted| wanted == candidate)
    }
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page_num: 1,
            page_size: DEFAULT_PAGE_SIZE,
            name: None,
        }
    }
}

/// One page of results plus the size of the full result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub total: u64,
    pub page_num: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(query: &ProductQuery, records: Vec<T>, total: u64) -> Self {
        Self {
            records,
            total,
            page_num: query.page_num(),
            page_size: query.page_size(),
        }
    }

    /// Slice an already-filtered result set; `total` is its full length.
    pub fn paginate(query: &ProductQuery, matching: Vec<T>) -> Self {
        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect();
        Self::new(query, records, total)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_page_number_and_oversized_pages() {
        assert!(matches!(
            ProductQuery::new(0, 10, None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            ProductQuery::new(1, 0, None),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            ProductQuery::new(1, MAX_PAGE_SIZE + 1, None),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn blank_name_means_no_filter() {
        let query = ProductQuery::new(1, 10, Some("  ".to_string())).unwrap();
        assert_eq!(query.name(), None);
        assert!(query.matches_name("anything"));
    }

    #[test]
    fn name_filter_uses_value_equality() {
        let wanted = String::from("Phone");
        let query = ProductQuery::default().with_name(wanted.clone());
        let candidate: String = ["Ph", "one"].concat();

        assert!(query.matches_name(&candidate));
        assert!(!query.matches_name("phone"));
        assert!(!query.matches_name("Phone "));
    }

    #[test]
    fn offset_past_end_yields_empty_records() {
        let query = ProductQuery::new(5, 10, None).unwrap();
        let page = Page::paginate(&query, (0..12).collect::<Vec<_>>());
        assert_eq!(page.total, 12);
        assert!(page.is_empty());
        assert_eq!(page.page_num, 5);
    }

    #[test]
    fn last_page_is_clipped() {
        let query = ProductQuery::new(2, 5, None).unwrap();
        let page = Page::paginate(&query, (0..7).collect::<Vec<_>>());
        assert_eq!(page.records, vec![5, 6]);
        assert_eq!(page.total, 7);
    }

    #[cfg(test)]
    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: len(records) == min(page_size, max(0, total - offset)).
            #[test]
            fn page_length_matches_window(
                len in 0usize..400,
                page_num in 1u32..50,
                page_size in 1u32..=MAX_PAGE_SIZE,
            ) {
                let query = ProductQuery::new(page_num, page_size, None).unwrap();
                let page = Page::paginate(&query, (0..len).collect::<Vec<_>>());

                let expected = (page_size as usize).min(len.saturating_sub(query.offset()));
                prop_assert_eq!(page.records.len(), expected);
                prop_assert_eq!(page.total, len as u64);
                if let Some(first) = page.records.first() {
                    prop_assert_eq!(*first, query.offset());
                }
            }
        }
    }
}
