use chrono::{DateTime, Utc};
use tracing::warn;

use crate::models::activities::{activity_status_label, ACTIVITY_STATUS_MAP};
use crate::models::{ActivityRecord, ActivityStatus};
use crate::pipeline::{derive_list, Category, Facets, ListConfig, ListParams};
use crate::services::list_view::{
    distinct_sorted, format_date, format_datetime, format_points, select_options, ListChrome,
    SelectOption,
};
use crate::services::refresh::{apply, CommandFailure, CommandOutcome, Notice};
use crate::session::SessionContext;
use crate::source::{Command, ListRequest, ListSource};

fn title(a: &ActivityRecord) -> Option<&str> {
    Some(a.title.as_str())
}

fn code(a: &ActivityRecord) -> Option<&str> {
    a.code.as_deref()
}

fn type_name(a: &ActivityRecord) -> Option<&str> {
    a.type_name.as_deref()
}

fn organizer(a: &ActivityRecord) -> Option<&str> {
    a.organizer.as_deref()
}

fn status(a: &ActivityRecord) -> Option<&str> {
    Some(a.status.as_str())
}

fn updated_at(a: &ActivityRecord) -> Option<DateTime<Utc>> {
    a.updated_at
}

fn created_at(a: &ActivityRecord) -> Option<DateTime<Utc>> {
    a.created_at
}

fn starts_at(a: &ActivityRecord) -> Option<DateTime<Utc>> {
    a.starts_at
}

fn facets(a: &ActivityRecord) -> Facets<'_> {
    Facets {
        type_name: a.type_name.as_deref(),
        status: Some(a.status.as_str()),
        date: a.starts_at,
        points: a.points,
        ..Facets::default()
    }
}

pub const ACTIVITY_LIST: ListConfig<ActivityRecord, ActivityStatus> = ListConfig {
    text_fields: &[title, code, type_name, organizer],
    category_field: status,
    category_map: ACTIVITY_STATUS_MAP,
    categories: &ActivityStatus::ALL,
    timestamp_fields: &[updated_at, created_at, starts_at],
    name_field: title,
    facets,
};

pub struct ActivityRowView {
    pub id: String,
    pub title: String,
    pub code: String,
    pub type_name: String,
    pub organizer: String,
    pub starts_label: String,
    pub deadline_label: String,
    pub points_label: String,
    pub status_key: String,
    pub status_label: String,
    pub capacity_label: String,
    pub is_full: bool,
    pub viewer_label: Option<String>,
    pub can_register: bool,
    pub can_cancel: bool,
    pub can_review: bool,
}

impl ActivityRowView {
    fn from_record(record: &ActivityRecord, session: &SessionContext, now: DateTime<Utc>) -> Self {
        let capacity_label = match (record.registered_count, record.capacity) {
            (Some(count), Some(cap)) if cap > 0 => format!("{count}/{cap}"),
            (Some(count), _) => count.to_string(),
            _ => String::new(),
        };
        let student = session.can_register_for_activities();
        ActivityRowView {
            id: record.id.clone(),
            title: record.title.clone(),
            code: record.code.clone().unwrap_or_default(),
            type_name: record.type_name.clone().unwrap_or_default(),
            organizer: record.organizer.clone().unwrap_or_default(),
            starts_label: format_datetime(record.starts_at),
            deadline_label: format_date(record.registration_deadline),
            points_label: format_points(record.points),
            status_key: record
                .status()
                .map(|s| s.key().to_string())
                .unwrap_or_default(),
            status_label: activity_status_label(&record.status).to_string(),
            capacity_label,
            is_full: record.is_full(),
            viewer_label: record.viewer_status.label().map(str::to_string),
            can_register: student && !record.is_full() && record.can_register(session.role, now),
            can_cancel: student && record.can_cancel(now),
            can_review: session.can_review_activities() && record.awaits_review(),
        }
    }
}

pub struct ActivitiesPageData {
    pub rows: Vec<ActivityRowView>,
    pub chrome: ListChrome,
    pub type_options: Vec<SelectOption>,
    /// Set when the list could not be loaded; the page still renders.
    pub error: Option<String>,
    pub return_to: String,
}

pub async fn build_activities_page(
    source: &dyn ListSource,
    session: &SessionContext,
    params: &ListParams,
    page_size: usize,
    now: DateTime<Utc>,
) -> ActivitiesPageData {
    let request = ListRequest::for_session(session);
    let (records, types) = tokio::join!(
        source.list_activities(session, &request),
        source.list_activity_types(session)
    );

    let mut error = None;
    let records = match records {
        Ok(page) => page.items,
        Err(e) => {
            warn!(user_id = %session.user_id, error = %e, "activity list fetch failed");
            error = Some(e.user_message());
            Vec::new()
        }
    };
    let type_options = match types {
        Ok(types) if !types.is_empty() => types,
        Ok(_) => distinct_types(&records),
        Err(e) => {
            warn!(error = %e, "activity types fetch failed");
            distinct_types(&records)
        }
    };

    let query = params.to_query(&ACTIVITY_LIST, page_size);
    let derived = derive_list(&records, &ACTIVITY_LIST, &query);
    let chrome = ListChrome::build(
        params,
        ACTIVITY_LIST.categories,
        &derived.counts,
        query.category.key(),
        query.sort,
        &derived.pagination,
    );

    ActivitiesPageData {
        rows: derived
            .visible
            .iter()
            .map(|record| ActivityRowView::from_record(record, session, now))
            .collect(),
        chrome,
        type_options: select_options(&type_options, params.value("type")),
        error,
        return_to: format!(
            "/activities{}",
            params.href_for_page(&derived.pagination.page)
        ),
    }
}

fn distinct_types(records: &[ActivityRecord]) -> Vec<String> {
    distinct_sorted(records.iter().filter_map(|r| r.type_name.as_deref()))
}

pub async fn register(
    source: &dyn ListSource,
    session: &SessionContext,
    activity_id: &str,
) -> CommandOutcome {
    if !session.can_register_for_activities() {
        return Err(CommandFailure::new(
            "Chỉ sinh viên và lớp trưởng mới có thể đăng ký hoạt động.",
        ));
    }
    let command = Command::RegisterActivity {
        activity_id: activity_id.to_string(),
    };
    apply(source, session, command, Notice::Registered).await
}

pub async fn cancel_registration(
    source: &dyn ListSource,
    session: &SessionContext,
    activity_id: &str,
) -> CommandOutcome {
    if !session.can_register_for_activities() {
        return Err(CommandFailure::new("Bạn không có đăng ký nào để hủy."));
    }
    let command = Command::CancelRegistration {
        activity_id: activity_id.to_string(),
    };
    apply(source, session, command, Notice::RegistrationCancelled).await
}

fn ensure_activity_reviewer(session: &SessionContext) -> Result<(), CommandFailure> {
    if session.can_review_activities() {
        Ok(())
    } else {
        Err(CommandFailure::new(
            "Chỉ giảng viên và quản trị viên mới có thể duyệt hoạt động.",
        ))
    }
}

pub async fn approve_activity(
    source: &dyn ListSource,
    session: &SessionContext,
    activity_id: &str,
) -> CommandOutcome {
    ensure_activity_reviewer(session)?;
    let command = Command::ApproveActivity {
        activity_id: activity_id.to_string(),
    };
    apply(source, session, command, Notice::ActivityApproved).await
}

pub async fn reject_activity(
    source: &dyn ListSource,
    session: &SessionContext,
    activity_id: &str,
    reason: &str,
) -> CommandOutcome {
    ensure_activity_reviewer(session)?;
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CommandFailure::new("Vui lòng nhập lý do từ chối."));
    }
    let command = Command::RejectActivity {
        activity_id: activity_id.to_string(),
        reason: reason.to_string(),
    };
    apply(source, session, command, Notice::ActivityRejected).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::activities::tests::activity;
    use crate::models::Role;
    use crate::source::snapshot::{SnapshotData, SnapshotSource};
    use chrono::TimeZone;

    fn student() -> SessionContext {
        SessionContext {
            user_id: "sv1".to_string(),
            role: Some(Role::Student),
            ..SessionContext::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn source(activities: Vec<ActivityRecord>) -> SnapshotSource {
        SnapshotSource::new(SnapshotData {
            activities,
            ..SnapshotData::default()
        })
    }

    #[tokio::test]
    async fn page_filters_and_counts_by_status() {
        let mut pending = activity("a3", "Hội thảo");
        pending.status = "cho_duyet".to_string();
        let src = source(vec![
            activity("a1", "Hiến máu nhân đạo"),
            activity("a2", "Hiến máu đợt 2"),
            pending,
        ]);
        let params = ListParams {
            q: Some("hiến".to_string()),
            ..ListParams::default()
        };

        let page = build_activities_page(&src, &student(), &params, 20, now()).await;
        assert!(page.error.is_none());
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.chrome.tabs[0].count, 2);
        let approved = page.chrome.tabs.iter().find(|t| t.key == "approved").unwrap();
        assert_eq!(approved.count, 2);
        assert!(page.return_to.starts_with("/activities?q="));
    }

    #[tokio::test]
    async fn rows_expose_register_actions_for_students_only() {
        let mut open = activity("a1", "Tình nguyện");
        open.starts_at = Some(Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        let src = source(vec![open]);
        let params = ListParams::default();

        let page = build_activities_page(&src, &student(), &params, 20, now()).await;
        assert!(page.rows[0].can_register);

        let teacher = SessionContext {
            role: Some(Role::Teacher),
            ..student()
        };
        let page = build_activities_page(&src, &teacher, &params, 20, now()).await;
        assert!(!page.rows[0].can_register);
    }

    #[tokio::test]
    async fn register_requires_a_student_role() {
        let src = source(vec![activity("a1", "x")]);
        let admin = SessionContext {
            role: Some(Role::Admin),
            ..student()
        };
        assert!(register(&src, &admin, "a1").await.is_err());
        assert_eq!(register(&src, &student(), "a1").await, Ok(Notice::Registered));
    }

    #[tokio::test]
    async fn approved_sign_up_offers_no_cancel() {
        let mut signed_up = activity("a1", "Tình nguyện");
        signed_up.viewer_status = crate::models::ViewerRegistration::Approved;
        let src = source(vec![signed_up]);

        let page = build_activities_page(&src, &student(), &ListParams::default(), 20, now()).await;
        assert!(!page.rows[0].can_cancel);
        assert!(!page.rows[0].can_register);
    }

    #[tokio::test]
    async fn teachers_review_pending_activities() {
        let mut pending = activity("a1", "Bóng đá");
        pending.status = "cho_duyet".to_string();
        let mut other = activity("a2", "Văn nghệ");
        other.status = "cho_duyet".to_string();
        let src = source(vec![pending, other, activity("a3", "Hiến máu")]);
        let teacher = SessionContext {
            role: Some(Role::Teacher),
            ..student()
        };

        let page = build_activities_page(&src, &teacher, &ListParams::default(), 20, now()).await;
        let reviewable: Vec<&str> = page
            .rows
            .iter()
            .filter(|r| r.can_review)
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(reviewable.len(), 2);
        assert!(!reviewable.contains(&"a3"));

        assert!(approve_activity(&src, &student(), "a1").await.is_err());
        assert!(reject_activity(&src, &teacher, "a2", "   ").await.is_err());
        assert_eq!(
            approve_activity(&src, &teacher, "a1").await,
            Ok(Notice::ActivityApproved)
        );
        assert_eq!(
            reject_activity(&src, &teacher, "a2", " Trùng lịch ").await,
            Ok(Notice::ActivityRejected)
        );

        let data = src.data().await;
        assert_eq!(data.activities[0].status, "da_duyet");
        assert_eq!(data.activities[1].status, "tu_choi");
    }

    #[test]
    fn type_options_fall_back_to_record_values() {
        let mut a = activity("a1", "x");
        a.type_name = Some("Tình nguyện".to_string());
        let mut b = activity("a2", "y");
        b.type_name = Some("Học thuật".to_string());
        let mut c = activity("a3", "z");
        c.type_name = Some("Tình nguyện".to_string());
        assert_eq!(
            distinct_types(&[a, b, c]),
            vec!["Học thuật".to_string(), "Tình nguyện".to_string()]
        );
    }
}
