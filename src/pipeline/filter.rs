use chrono::{DateTime, NaiveDate, Utc};

use super::{Category, Facets, ListConfig};

/// Search box plus the structured filters of a list page. Absent or blank
/// values never constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub query: String,
    pub type_name: Option<String>,
    pub status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_points: Option<f64>,
    pub max_points: Option<f64>,
    pub class_id: Option<String>,
    pub student_code: Option<String>,
}

impl FilterState {
    pub fn with_query(query: impl Into<String>) -> Self {
        FilterState {
            query: query.into(),
            ..FilterState::default()
        }
    }

    /// Number of structured filters in effect (the search box excluded).
    pub fn active_count(&self) -> usize {
        [
            present(&self.type_name),
            present(&self.status),
            self.date_from.is_some(),
            self.date_to.is_some(),
            self.min_points.is_some(),
            self.max_points.is_some(),
            present(&self.class_id),
            present(&self.student_code),
        ]
        .into_iter()
        .filter(|on| *on)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.query.trim().is_empty() && self.active_count() == 0
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn constraint(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn start_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// Records matching `filter`, in input order.
pub fn filter_records<'r, R: 'static, C: Category>(
    records: &'r [R],
    config: &ListConfig<R, C>,
    filter: &FilterState,
) -> Vec<&'r R> {
    let needle = filter.query.trim().to_lowercase();
    records
        .iter()
        .filter(|record| matches_query(*record, config, &needle))
        .filter(|record| matches_structured(*record, config, filter))
        .collect()
}

/// `needle` must already be trimmed and lowercased.
pub fn matches_query<R: 'static, C: Category>(
    record: &R,
    config: &ListConfig<R, C>,
    needle: &str,
) -> bool {
    if needle.is_empty() {
        return true;
    }
    config
        .text_fields
        .iter()
        .filter_map(|field| field(record))
        .any(|text| text.to_lowercase().contains(needle))
}

pub fn matches_structured<R: 'static, C: Category>(
    record: &R,
    config: &ListConfig<R, C>,
    filter: &FilterState,
) -> bool {
    let facets: Facets<'_> = (config.facets)(record);

    if let Some(wanted) = constraint(&filter.type_name) {
        let ok = facets
            .type_name
            .is_some_and(|t| t.trim().to_lowercase() == wanted.to_lowercase());
        if !ok {
            return false;
        }
    }

    if let Some(wanted) = constraint(&filter.status) {
        let Some(actual) = facets.status else {
            return false;
        };
        // Compare buckets when the filter names one, so synonyms agree.
        let ok = match config.lookup_category(wanted) {
            Some(bucket) => config.lookup_category(actual) == Some(bucket),
            None => actual.trim().eq_ignore_ascii_case(wanted),
        };
        if !ok {
            return false;
        }
    }

    if filter.date_from.is_some() || filter.date_to.is_some() {
        let Some(date) = facets.date else {
            return false;
        };
        if let Some(start) = filter.date_from.and_then(start_of_day) {
            if date < start {
                return false;
            }
        }
        if let Some(end) = filter.date_to.and_then(|to| to.succ_opt()).and_then(start_of_day) {
            if date >= end {
                return false;
            }
        }
    }

    if filter.min_points.is_some() || filter.max_points.is_some() {
        let Some(points) = facets.points else {
            return false;
        };
        if filter.min_points.is_some_and(|min| points < min) {
            return false;
        }
        if filter.max_points.is_some_and(|max| points > max) {
            return false;
        }
    }

    if let Some(wanted) = constraint(&filter.class_id) {
        if facets.class_id.map(str::trim) != Some(wanted) {
            return false;
        }
    }

    if let Some(wanted) = constraint(&filter.student_code) {
        let wanted = wanted.to_lowercase();
        let ok = facets
            .student_code
            .is_some_and(|code| code.to_lowercase().contains(&wanted));
        if !ok {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activities::tests::activity;
    use crate::models::registrations::tests::registration;
    use crate::services::activities_service::ACTIVITY_LIST;
    use crate::services::registrations_service::REGISTRATION_LIST;
    use chrono::{TimeZone, Utc};

    #[test]
    fn blank_values_do_not_constrain() {
        let records = vec![activity("a1", "Hiến máu"), activity("a2", "Seminar")];
        let filter = FilterState {
            query: "   ".to_string(),
            type_name: Some(String::new()),
            status: Some("  ".to_string()),
            class_id: Some(String::new()),
            ..FilterState::default()
        };
        assert!(filter.is_empty());
        let out = filter_records(&records, &ACTIVITY_LIST, &filter);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn query_is_case_insensitive_over_text_fields() {
        let mut records = vec![
            activity("a1", "SEMINAR Kỹ năng"),
            activity("a2", "Hiến máu"),
            activity("a3", "Tình nguyện"),
        ];
        records[2].code = Some("SEM-03".to_string());
        let out = filter_records(&records, &ACTIVITY_LIST, &FilterState::with_query("Sem"));
        let ids: Vec<_> = out.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a3"]);
    }

    #[test]
    fn missing_field_never_matches_a_filter_on_it() {
        let mut with_points = activity("a1", "x");
        with_points.points = Some(5.0);
        let without_points = activity("a2", "y");
        let records = vec![with_points, without_points];

        let filter = FilterState {
            min_points: Some(1.0),
            ..FilterState::default()
        };
        let out = filter_records(&records, &ACTIVITY_LIST, &filter);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a1");
    }

    #[test]
    fn status_filter_accepts_synonyms() {
        let records = vec![
            registration("r1", "da_duyet"),
            registration("r2", "cho_duyet"),
            registration("r3", "weird"),
        ];
        let filter = FilterState {
            status: Some("approved".to_string()),
            ..FilterState::default()
        };
        let out = filter_records(&records, &REGISTRATION_LIST, &filter);
        assert_eq!(out.len(), 1);

        let raw = FilterState {
            status: Some("WEIRD".to_string()),
            ..FilterState::default()
        };
        assert_eq!(filter_records(&records, &REGISTRATION_LIST, &raw).len(), 1);
    }

    #[test]
    fn date_range_is_inclusive_of_whole_days() {
        let mut a = activity("a1", "x");
        a.starts_at = Some(Utc.with_ymd_and_hms(2025, 3, 31, 23, 30, 0).unwrap());
        let records = vec![a];
        let filter = FilterState {
            date_from: NaiveDate::from_ymd_opt(2025, 3, 31),
            date_to: NaiveDate::from_ymd_opt(2025, 3, 31),
            ..FilterState::default()
        };
        assert_eq!(filter_records(&records, &ACTIVITY_LIST, &filter).len(), 1);

        let later = FilterState {
            date_from: NaiveDate::from_ymd_opt(2025, 4, 1),
            ..FilterState::default()
        };
        assert!(filter_records(&records, &ACTIVITY_LIST, &later).is_empty());
    }

    #[test]
    fn active_count_skips_blank_strings() {
        let filter = FilterState {
            type_name: Some("Tình nguyện".to_string()),
            class_id: Some(" ".to_string()),
            min_points: Some(2.0),
            ..FilterState::default()
        };
        assert_eq!(filter.active_count(), 2);
    }
}
