//! List derivation shared by every list page.
//!
//! A page hands over the records it fetched, a [`ListConfig`] describing the
//! record type, and the [`ListQuery`] built from its UI controls. The result is
//! the slice to render, per-category counts, and the clamped pagination.
//!
//! The pipeline is a pure function: it never fails, and malformed records
//! degrade to "does not match" instead of errors.

pub mod collation;
pub mod counts;
pub mod filter;
pub mod pagination;
pub mod sort;
pub mod state;

use chrono::{DateTime, Utc};

use crate::models::lookup_status;

pub use counts::{count_categories, CategoryCounts};
pub use filter::FilterState;
pub use pagination::Pagination;
pub use sort::SortKey;
pub use state::{ListParams, ListQuery};

/// A fixed bucket that records of one type are grouped into (status tabs).
pub trait Category: Copy + Eq + 'static {
    /// Stable key used in URLs.
    fn key(self) -> &'static str;
    fn label(self) -> &'static str;
}

pub type TextField<R> = for<'a> fn(&'a R) -> Option<&'a str>;
pub type TimestampField<R> = fn(&R) -> Option<DateTime<Utc>>;

/// Fields referenced by structured filters and the points sort.
#[derive(Debug, Clone, Copy, Default)]
pub struct Facets<'a> {
    pub type_name: Option<&'a str>,
    pub status: Option<&'a str>,
    pub date: Option<DateTime<Utc>>,
    pub points: Option<f64>,
    pub class_id: Option<&'a str>,
    pub student_code: Option<&'a str>,
}

/// Per-record-type configuration. Behavior differences between list pages
/// live here instead of in separate code paths.
pub struct ListConfig<R: 'static, C: 'static> {
    /// Fields the free-text query searches.
    pub text_fields: &'static [TextField<R>],
    /// Raw value looked up in `category_map`.
    pub category_field: TextField<R>,
    /// Raw value synonyms to bucket.
    pub category_map: &'static [(&'static str, C)],
    /// Every bucket, in display order.
    pub categories: &'static [C],
    /// Candidate timestamps for date sorting, first non-null wins.
    pub timestamp_fields: &'static [TimestampField<R>],
    pub name_field: TextField<R>,
    pub facets: for<'a> fn(&'a R) -> Facets<'a>,
}

impl<R: 'static, C: Category> ListConfig<R, C> {
    pub fn category_of(&self, record: &R) -> Option<C> {
        (self.category_field)(record).and_then(|raw| self.lookup_category(raw))
    }

    pub fn lookup_category(&self, raw: &str) -> Option<C> {
        lookup_status(self.category_map, raw)
    }

    pub fn timestamp_of(&self, record: &R) -> Option<DateTime<Utc>> {
        self.timestamp_fields.iter().find_map(|field| field(record))
    }

    /// Parses a tab value: a category key, any raw synonym, or "all".
    pub fn parse_category(&self, raw: Option<&str>) -> CategoryFilter<C> {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return CategoryFilter::All;
        };
        if let Some(category) = self
            .categories
            .iter()
            .copied()
            .find(|c| c.key().eq_ignore_ascii_case(raw))
        {
            return CategoryFilter::Only(category);
        }
        self.lookup_category(raw)
            .map(CategoryFilter::Only)
            .unwrap_or(CategoryFilter::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter<C> {
    #[default]
    All,
    Only(C),
}

impl<C: Category> CategoryFilter<C> {
    pub fn admits(&self, category: Option<C>) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(wanted) => category == Some(*wanted),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Only(c) => c.key(),
        }
    }
}

#[derive(Debug)]
pub struct DerivedList<'r, R, C> {
    pub visible: Vec<&'r R>,
    pub counts: CategoryCounts<C>,
    pub pagination: Pagination,
}

/// Filter, count, categorize, sort and paginate `records`.
pub fn derive_list<'r, R: 'static, C: Category>(
    records: &'r [R],
    config: &ListConfig<R, C>,
    query: &ListQuery<C>,
) -> DerivedList<'r, R, C> {
    let filtered = filter::filter_records(records, config, &query.filter);
    let counts = count_categories(&filtered, config);

    let mut selected: Vec<&R> = filtered
        .into_iter()
        .filter(|record| query.category.admits(config.category_of(record)))
        .collect();
    sort::sort_records(&mut selected, config, query.sort);

    let pagination = query.pagination.with_total(selected.len()).clamped();
    let range = pagination.bounds();
    let visible = selected
        .into_iter()
        .skip(range.start)
        .take(range.len())
        .collect();

    DerivedList {
        visible,
        counts,
        pagination,
    }
}
