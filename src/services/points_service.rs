//! Reward points ("điểm rèn luyện") earned from attended activities.

use tracing::warn;

use crate::models::{RegistrationRecord, RegistrationStatus};
use crate::pipeline::collation;
use crate::pipeline::Category;
use crate::services::list_view::format_points;
use crate::session::SessionContext;
use crate::source::{ListRequest, ListSource, RegistrationScope};

const UNTYPED: &str = "Khác";

/// Grade thresholds, lowest first.
const GRADES: [(f64, &str); 4] = [
    (50.0, "Trung bình"),
    (65.0, "Khá"),
    (80.0, "Tốt"),
    (90.0, "Xuất sắc"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct TypePoints {
    pub type_name: String,
    pub points: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointsSummary {
    pub total: f64,
    /// `total` rounded to one decimal.
    pub rounded_total: f64,
    pub attended_count: usize,
    pub by_type: Vec<TypePoints>,
    /// Registrations per status, every status listed.
    pub by_status: Vec<(RegistrationStatus, usize)>,
}

pub fn summarize_points(registrations: &[RegistrationRecord]) -> PointsSummary {
    let mut by_status: Vec<(RegistrationStatus, usize)> =
        RegistrationStatus::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_type: Vec<TypePoints> = Vec::new();
    let mut total = 0.0;
    let mut attended_count = 0;

    for registration in registrations {
        let Some(status) = registration.status() else {
            continue;
        };
        if let Some(slot) = by_status.iter_mut().find(|(s, _)| *s == status) {
            slot.1 += 1;
        }
        if status != RegistrationStatus::Attended {
            continue;
        }

        attended_count += 1;
        let points = registration
            .activity
            .points
            .filter(|p| p.is_finite())
            .unwrap_or(0.0);
        total += points;

        let type_name = registration
            .activity
            .type_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTYPED);
        match by_type.iter_mut().find(|t| t.type_name == type_name) {
            Some(slot) => {
                slot.points += points;
                slot.count += 1;
            }
            None => by_type.push(TypePoints {
                type_name: type_name.to_string(),
                points,
                count: 1,
            }),
        }
    }

    by_type.sort_by(|a, b| {
        b.points
            .total_cmp(&a.points)
            .then_with(|| collation::compare(&a.type_name, &b.type_name))
    });

    PointsSummary {
        total,
        rounded_total: (total * 10.0).round() / 10.0,
        attended_count,
        by_type,
        by_status,
    }
}

/// Points still missing for the next grade, with the text shown to students.
pub fn next_goal(points: f64) -> (f64, String) {
    let points = if points.is_finite() { points.max(0.0) } else { 0.0 };
    match GRADES.iter().find(|(threshold, _)| points < *threshold) {
        Some((threshold, grade)) => {
            let remaining = (threshold - points).ceil();
            (remaining, format!("Cần {remaining:.0} điểm để đạt {grade}"))
        }
        None => (0.0, "Đã đạt Xuất sắc".to_string()),
    }
}

pub struct TypeRowView {
    pub type_name: String,
    pub points_label: String,
    pub count: usize,
}

pub struct StatusRowView {
    pub label: String,
    pub count: usize,
}

pub struct PointsPageData {
    pub total_label: String,
    pub attended_count: usize,
    pub goal_text: String,
    pub types: Vec<TypeRowView>,
    pub statuses: Vec<StatusRowView>,
    pub error: Option<String>,
}

pub async fn build_points_page(source: &dyn ListSource, session: &SessionContext) -> PointsPageData {
    let request = ListRequest::for_session(session);
    let (registrations, error) = match source
        .list_registrations(session, &RegistrationScope::Own, &request)
        .await
    {
        Ok(page) => (page.items, None),
        Err(e) => {
            warn!(user_id = %session.user_id, error = %e, "points fetch failed");
            (Vec::new(), Some(e.user_message()))
        }
    };

    let summary = summarize_points(&registrations);
    let (_, goal_text) = next_goal(summary.rounded_total);
    PointsPageData {
        total_label: format_points(Some(summary.rounded_total)),
        attended_count: summary.attended_count,
        goal_text,
        types: summary
            .by_type
            .iter()
            .map(|t| TypeRowView {
                type_name: t.type_name.clone(),
                points_label: format_points(Some(t.points)),
                count: t.count,
            })
            .collect(),
        statuses: summary
            .by_status
            .iter()
            .map(|(status, count)| StatusRowView {
                label: status.label().to_string(),
                count: *count,
            })
            .collect(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registrations::tests::registration;

    fn attended(id: &str, type_name: Option<&str>, points: Option<f64>) -> RegistrationRecord {
        let mut r = registration(id, "da_tham_gia");
        r.activity.type_name = type_name.map(str::to_string);
        r.activity.points = points;
        r
    }

    #[test]
    fn only_attended_registrations_earn_points() {
        let mut approved = registration("r9", "da_duyet");
        approved.activity.points = Some(50.0);
        let records = vec![
            attended("r1", Some("Tình nguyện"), Some(5.0)),
            attended("r2", Some("Tình nguyện"), Some(2.5)),
            attended("r3", None, Some(3.0)),
            attended("r4", Some("Học thuật"), None),
            approved,
            registration("r10", "???"),
        ];
        let summary = summarize_points(&records);

        assert_eq!(summary.total, 10.5);
        assert_eq!(summary.attended_count, 4);
        assert_eq!(summary.by_type[0].type_name, "Tình nguyện");
        assert_eq!(summary.by_type[0].points, 7.5);
        assert_eq!(summary.by_type[0].count, 2);
        assert!(summary.by_type.iter().any(|t| t.type_name == "Khác"));
        assert_eq!(
            summary.by_status,
            vec![
                (RegistrationStatus::Pending, 0),
                (RegistrationStatus::Approved, 1),
                (RegistrationStatus::Rejected, 0),
                (RegistrationStatus::Attended, 4),
            ]
        );
    }

    #[test]
    fn totals_round_to_one_decimal() {
        let records = vec![
            attended("r1", None, Some(0.12)),
            attended("r2", None, Some(0.2)),
        ];
        assert_eq!(summarize_points(&records).rounded_total, 0.3);
        assert_eq!(summarize_points(&[]).total, 0.0);
    }

    #[test]
    fn goals_follow_grade_thresholds() {
        assert_eq!(next_goal(0.0).0, 50.0);
        assert_eq!(next_goal(49.5).1, "Cần 1 điểm để đạt Trung bình");
        assert_eq!(next_goal(70.0).0, 10.0);
        assert_eq!(next_goal(95.0), (0.0, "Đã đạt Xuất sắc".to_string()));
    }
}
