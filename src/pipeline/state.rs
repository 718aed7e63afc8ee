use chrono::NaiveDate;
use serde::Deserialize;

use super::{Category, CategoryFilter, FilterState, ListConfig, Pagination, SortKey};

pub const MAX_LIMIT: usize = 100;

/// UI state of one list page. Changing what is shown sends the user back to
/// page 1; re-sorting keeps the page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery<C> {
    pub filter: FilterState,
    pub category: CategoryFilter<C>,
    pub sort: SortKey,
    pub pagination: Pagination,
}

impl<C: Category> ListQuery<C> {
    pub fn new(limit: usize) -> Self {
        ListQuery {
            filter: FilterState::default(),
            category: CategoryFilter::All,
            sort: SortKey::default(),
            pagination: Pagination::new(limit),
        }
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.filter.query = query.into();
        self.pagination.page = 1;
    }

    pub fn set_filter(&mut self, filter: FilterState) {
        self.filter = filter;
        self.pagination.page = 1;
    }

    pub fn set_category(&mut self, category: CategoryFilter<C>) {
        self.category = category;
        self.pagination.page = 1;
    }

    pub fn set_limit(&mut self, limit: usize) {
        self.pagination = self.pagination.with_limit(limit.min(MAX_LIMIT));
    }

    pub fn set_sort(&mut self, sort: SortKey) {
        self.sort = sort;
    }

    /// Requests `page`; the pipeline clamps it once the total is known.
    pub fn go_to(&mut self, page: usize) {
        self.pagination.page = page.max(1);
    }
}

/// Raw list controls as they appear in the URL.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ListParams {
    pub q: Option<String>,
    #[serde(rename = "type")]
    pub type_name: Option<String>,
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub min_points: Option<String>,
    pub max_points: Option<String>,
    pub class: Option<String>,
    pub student_code: Option<String>,
    pub tab: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ListParams {
    /// Unparseable values are dropped rather than rejected.
    pub fn to_query<R: 'static, C: Category>(
        &self,
        config: &ListConfig<R, C>,
        default_limit: usize,
    ) -> ListQuery<C> {
        let mut query = ListQuery::new(default_limit);
        query.set_filter(self.filter_state());
        query.set_category(config.parse_category(self.tab.as_deref()));
        if let Some(limit) = parse_number::<usize>(&self.limit) {
            query.set_limit(limit);
        }
        if let Some(sort) = non_blank(&self.sort) {
            query.set_sort(SortKey::parse(sort));
        }
        if let Some(page) = parse_number::<usize>(&self.page) {
            query.go_to(page);
        }
        query
    }

    pub fn filter_state(&self) -> FilterState {
        FilterState {
            query: self.q.clone().unwrap_or_default(),
            type_name: non_blank(&self.type_name).map(str::to_string),
            status: non_blank(&self.status).map(str::to_string),
            date_from: parse_date(&self.from),
            date_to: parse_date(&self.to),
            min_points: parse_number::<f64>(&self.min_points).filter(|p| p.is_finite()),
            max_points: parse_number::<f64>(&self.max_points).filter(|p| p.is_finite()),
            class_id: non_blank(&self.class).map(str::to_string),
            student_code: non_blank(&self.student_code).map(str::to_string),
        }
    }

    pub fn value(&self, name: &str) -> &str {
        let value = match name {
            "q" => self.q.as_deref(),
            "type" => self.type_name.as_deref(),
            "status" => self.status.as_deref(),
            "from" => self.from.as_deref(),
            "to" => self.to.as_deref(),
            "min_points" => self.min_points.as_deref(),
            "max_points" => self.max_points.as_deref(),
            "class" => self.class.as_deref(),
            "student_code" => self.student_code.as_deref(),
            "tab" => self.tab.as_deref(),
            "sort" => self.sort.as_deref(),
            "page" => self.page.as_deref(),
            "limit" => self.limit.as_deref(),
            _ => None,
        };
        value.unwrap_or("")
    }

    /// Query string for the same list on another page.
    pub fn href_for_page(&self, page: &usize) -> String {
        self.encode(&[("page", Some(page.to_string()))])
    }

    /// Query string for another tab; starts over at page 1.
    pub fn href_for_tab(&self, tab: &str) -> String {
        self.encode(&[("tab", Some(tab.to_string())), ("page", None)])
    }

    pub fn href_for_sort(&self, sort: &str) -> String {
        self.encode(&[("sort", Some(sort.to_string()))])
    }

    fn encode(&self, overrides: &[(&str, Option<String>)]) -> String {
        const KEYS: [&str; 13] = [
            "q",
            "type",
            "status",
            "from",
            "to",
            "min_points",
            "max_points",
            "class",
            "student_code",
            "tab",
            "sort",
            "page",
            "limit",
        ];
        let mut out = url::form_urlencoded::Serializer::new(String::new());
        for key in KEYS {
            let value = match overrides.iter().find(|(name, _)| *name == key) {
                Some((_, replacement)) => replacement.clone(),
                None => Some(self.value(key).to_string()),
            };
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                out.append_pair(key, &value);
            }
        }
        format!("?{}", out.finish())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    non_blank(value).and_then(|v| v.parse::<T>().ok())
}

fn parse_date(value: &Option<String>) -> Option<NaiveDate> {
    non_blank(value).and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}
