//! View pieces every list page renders the same way: status tabs, the sort
//! selector and the pager.

use chrono::{DateTime, FixedOffset, Utc};

use crate::pipeline::collation;
use crate::pipeline::{Category, CategoryCounts, ListParams, Pagination, SortKey};

/// Portal times are shown in Vietnam time.
const DISPLAY_OFFSET_SECS: i32 = 7 * 3600;
const PAGER_RADIUS: usize = 2;
const PAGE_SIZES: [usize; 4] = [10, 20, 50, 100];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabView {
    pub key: String,
    pub label: String,
    pub count: usize,
    pub active: bool,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLink {
    pub number: usize,
    pub href: String,
    pub current: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerView {
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
    /// 1-based range of the rows on this page; both 0 when empty.
    pub first_row: usize,
    pub last_row: usize,
    pub prev_href: Option<String>,
    pub next_href: Option<String>,
    pub links: Vec<PageLink>,
}

/// Controls shared by every list page.
#[derive(Debug, Clone)]
pub struct ListChrome {
    pub tabs: Vec<TabView>,
    pub sort_options: Vec<SelectOption>,
    pub limit_options: Vec<SelectOption>,
    pub pager: PagerView,
    pub params: ListParams,
    pub active_filters: usize,
}

impl ListChrome {
    pub fn build<C: Category>(
        params: &ListParams,
        categories: &[C],
        counts: &CategoryCounts<C>,
        active_tab: &str,
        sort: SortKey,
        pagination: &Pagination,
    ) -> ListChrome {
        let mut tabs = vec![TabView {
            key: "all".to_string(),
            label: "Tất cả".to_string(),
            count: counts.total,
            active: active_tab == "all",
            href: params.href_for_tab("all"),
        }];
        tabs.extend(categories.iter().map(|category| TabView {
            key: category.key().to_string(),
            label: category.label().to_string(),
            count: counts.get(*category),
            active: active_tab == category.key(),
            href: params.href_for_tab(category.key()),
        }));

        let sort_options = SortKey::ALL
            .iter()
            .map(|key| SelectOption {
                value: key.as_str().to_string(),
                label: key.label().to_string(),
                selected: *key == sort,
            })
            .collect();

        ListChrome {
            tabs,
            sort_options,
            limit_options: limit_options(pagination.limit),
            pager: pager_view(params, pagination),
            params: params.clone(),
            active_filters: params.filter_state().active_count(),
        }
    }
}

/// Page sizes offered in the selector. A configured size outside the usual
/// steps is listed too so the current choice stays selected.
fn limit_options(current: usize) -> Vec<SelectOption> {
    let mut sizes = PAGE_SIZES.to_vec();
    if !sizes.contains(&current) {
        sizes.push(current);
        sizes.sort_unstable();
    }
    sizes
        .into_iter()
        .map(|size| SelectOption {
            value: size.to_string(),
            label: size.to_string(),
            selected: size == current,
        })
        .collect()
}

pub fn pager_view(params: &ListParams, pagination: &Pagination) -> PagerView {
    let range = pagination.bounds();
    let (first_row, last_row) = if range.is_empty() {
        (0, 0)
    } else {
        (range.start + 1, range.end)
    };
    PagerView {
        page: pagination.page,
        page_count: pagination.page_count(),
        total: pagination.total,
        first_row,
        last_row,
        prev_href: pagination
            .has_prev()
            .then(|| params.href_for_page(&(pagination.page - 1))),
        next_href: pagination
            .has_next()
            .then(|| params.href_for_page(&(pagination.page + 1))),
        links: pagination
            .window(PAGER_RADIUS)
            .into_iter()
            .map(|number| PageLink {
                number,
                href: params.href_for_page(&number),
                current: number == pagination.page,
            })
            .collect(),
    }
}

/// Dropdown entries for `values`, marking the one equal to `current`.
pub fn select_options(values: &[String], current: &str) -> Vec<SelectOption> {
    let current = current.trim();
    values
        .iter()
        .map(|value| SelectOption {
            value: value.clone(),
            label: value.clone(),
            selected: !current.is_empty() && value.trim() == current,
        })
        .collect()
}

/// Distinct non-blank values in collation order, for filter dropdowns.
pub fn distinct_sorted<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values.into_iter().map(str::trim).filter(|v| !v.is_empty()) {
        if !out.iter().any(|seen| seen == value) {
            out.push(value.to_string());
        }
    }
    out.sort_by(|a, b| collation::compare(a, b));
    out
}

fn local(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(DISPLAY_OFFSET_SECS) {
        Some(offset) => at.with_timezone(&offset),
        None => at.fixed_offset(),
    }
}

pub fn format_date(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| local(at).format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

pub fn format_datetime(at: Option<DateTime<Utc>>) -> String {
    at.map(|at| local(at).format("%H:%M %d/%m/%Y").to_string())
        .unwrap_or_default()
}

/// Points without a trailing `.0`; one decimal otherwise.
pub fn format_points(points: Option<f64>) -> String {
    match points.filter(|p| p.is_finite()) {
        Some(p) if p.fract() == 0.0 => format!("{p:.0}"),
        Some(p) => format!("{p:.1}"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistrationStatus;
    use chrono::TimeZone;

    #[test]
    fn tabs_start_with_all() {
        let counts = CategoryCounts {
            total: 5,
            by_category: vec![
                (RegistrationStatus::Pending, 2),
                (RegistrationStatus::Approved, 3),
                (RegistrationStatus::Rejected, 0),
                (RegistrationStatus::Attended, 0),
            ],
        };
        let params = ListParams {
            tab: Some("pending".to_string()),
            page: Some("3".to_string()),
            ..ListParams::default()
        };
        let chrome = ListChrome::build(
            &params,
            &RegistrationStatus::ALL,
            &counts,
            "pending",
            SortKey::Newest,
            &Pagination::new(20).with_total(2).clamped(),
        );

        assert_eq!(chrome.tabs.len(), 5);
        assert_eq!(chrome.tabs[0].key, "all");
        assert_eq!(chrome.tabs[0].count, 5);
        assert!(chrome.tabs[1].active);
        assert_eq!(chrome.tabs[1].count, 2);
        assert!(!chrome.tabs[2].href.contains("page="));
        assert!(chrome.sort_options[0].selected);
        let selected: Vec<&str> = chrome
            .limit_options
            .iter()
            .filter(|o| o.selected)
            .map(|o| o.value.as_str())
            .collect();
        assert_eq!(selected, vec!["20"]);
    }

    #[test]
    fn page_size_choices_keep_an_unusual_current_size() {
        let values: Vec<String> = limit_options(25).into_iter().map(|o| o.value).collect();
        assert_eq!(values, vec!["10", "20", "25", "50", "100"]);
        assert_eq!(limit_options(50).iter().filter(|o| o.selected).count(), 1);
    }

    #[test]
    fn pager_reports_row_range() {
        let params = ListParams::default();
        let pagination = Pagination::new(10).with_total(25).go_to(3).clamped();
        let pager = pager_view(&params, &pagination);
        assert_eq!((pager.first_row, pager.last_row), (21, 25));
        assert_eq!(pager.page_count, 3);
        assert_eq!(pager.next_href, None);
        assert_eq!(pager.prev_href.as_deref(), Some("?page=2"));

        let empty = pager_view(&params, &Pagination::new(10).clamped());
        assert_eq!((empty.first_row, empty.last_row), (0, 0));
        assert_eq!(empty.page_count, 1);
    }

    #[test]
    fn dates_render_in_vietnam_time() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 20, 30, 0).unwrap();
        assert_eq!(format_date(Some(at)), "02/03/2025");
        assert_eq!(format_datetime(Some(at)), "03:30 02/03/2025");
        assert_eq!(format_date(None), "");
    }

    #[test]
    fn distinct_values_sort_vietnamese() {
        let values = ["Tình nguyện", " ", "Học thuật", "Tình nguyện", "Đoàn hội"];
        assert_eq!(
            distinct_sorted(values),
            vec!["Đoàn hội", "Học thuật", "Tình nguyện"]
        );
    }

    #[test]
    fn select_options_mark_the_current_value() {
        let values = vec!["Học thuật".to_string(), "Tình nguyện".to_string()];
        let options = select_options(&values, " Tình nguyện ");
        assert!(!options[0].selected);
        assert!(options[1].selected);
        assert!(select_options(&values, "").iter().all(|o| !o.selected));
    }

    #[test]
    fn points_drop_trailing_zero() {
        assert_eq!(format_points(Some(5.0)), "5");
        assert_eq!(format_points(Some(2.5)), "2.5");
        assert_eq!(format_points(Some(f64::NAN)), "");
    }
}
