use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::models::registrations::REGISTRATION_STATUS_MAP;
use crate::models::{RegistrationRecord, RegistrationStatus, Role};
use crate::pipeline::{derive_list, Category, Facets, ListConfig, ListParams};
use crate::services::list_view::{
    distinct_sorted, format_date, format_datetime, format_points, select_options, ListChrome,
    SelectOption,
};
use crate::services::refresh::{apply, CommandFailure, CommandOutcome, Notice};
use crate::session::SessionContext;
use crate::source::{Command, ListRequest, ListSource, RegistrationScope};

fn student_name(r: &RegistrationRecord) -> Option<&str> {
    r.student.name.as_deref()
}

fn student_code(r: &RegistrationRecord) -> Option<&str> {
    r.student.student_code.as_deref()
}

fn activity_title(r: &RegistrationRecord) -> Option<&str> {
    r.activity.title.as_deref()
}

fn activity_code(r: &RegistrationRecord) -> Option<&str> {
    r.activity.code.as_deref()
}

fn status(r: &RegistrationRecord) -> Option<&str> {
    Some(r.status.as_str())
}

/// Students are listed by name; rows without one fall back to the activity.
fn display_name(r: &RegistrationRecord) -> Option<&str> {
    r.student
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .or(r.activity.title.as_deref())
}

fn approved_at(r: &RegistrationRecord) -> Option<DateTime<Utc>> {
    r.approved_at
}

fn updated_at(r: &RegistrationRecord) -> Option<DateTime<Utc>> {
    r.updated_at
}

fn created_at(r: &RegistrationRecord) -> Option<DateTime<Utc>> {
    r.created_at
}

fn registered_at(r: &RegistrationRecord) -> Option<DateTime<Utc>> {
    r.registered_at
}

fn facets(r: &RegistrationRecord) -> Facets<'_> {
    Facets {
        type_name: r.activity.type_name.as_deref(),
        status: Some(r.status.as_str()),
        date: r.activity.starts_at.or(r.registered_at),
        points: r.activity.points,
        class_id: r.student.class_id.as_deref(),
        student_code: r.student.student_code.as_deref(),
    }
}

pub const REGISTRATION_LIST: ListConfig<RegistrationRecord, RegistrationStatus> = ListConfig {
    text_fields: &[student_name, student_code, activity_title, activity_code],
    category_field: status,
    category_map: REGISTRATION_STATUS_MAP,
    categories: &RegistrationStatus::ALL,
    timestamp_fields: &[approved_at, updated_at, created_at, registered_at],
    name_field: display_name,
    facets,
};

pub struct RegistrationRowView {
    pub id: String,
    pub student_name: String,
    pub student_code: String,
    pub class_label: String,
    pub activity_title: String,
    pub activity_code: String,
    pub type_name: String,
    pub points_label: String,
    pub starts_label: String,
    pub registered_label: String,
    pub status_key: String,
    pub status_label: String,
    pub rejection_reason: String,
    pub approver_label: String,
    pub can_review: bool,
}

impl RegistrationRowView {
    fn from_record(record: &RegistrationRecord, session: &SessionContext) -> Self {
        let student = &record.student;
        RegistrationRowView {
            id: record.id.clone(),
            student_name: student.name.clone().unwrap_or_default(),
            student_code: student.student_code.clone().unwrap_or_default(),
            class_label: student
                .class_name
                .clone()
                .or_else(|| student.class_id.clone())
                .unwrap_or_default(),
            activity_title: record.activity.title.clone().unwrap_or_default(),
            activity_code: record.activity.code.clone().unwrap_or_default(),
            type_name: record.activity.type_name.clone().unwrap_or_default(),
            points_label: format_points(record.activity.points),
            starts_label: format_datetime(record.activity.starts_at),
            registered_label: format_date(record.registered_at.or(record.created_at)),
            status_key: record
                .status()
                .map(|s| s.key().to_string())
                .unwrap_or_default(),
            status_label: record.status_label().to_string(),
            rejection_reason: record.rejection_reason.clone().unwrap_or_default(),
            approver_label: record
                .approver_role
                .map(Role::label)
                .unwrap_or_default()
                .to_string(),
            can_review: record.is_pending() && session.can_review(record),
        }
    }
}

pub struct RegistrationsPageData {
    pub heading: &'static str,
    pub rows: Vec<RegistrationRowView>,
    pub chrome: ListChrome,
    pub type_options: Vec<SelectOption>,
    /// Any row on this page can be approved or rejected.
    pub can_review: bool,
    pub show_student: bool,
    pub error: Option<String>,
    pub return_to: String,
}

pub async fn build_registrations_page(
    source: &dyn ListSource,
    session: &SessionContext,
    params: &ListParams,
    page_size: usize,
) -> RegistrationsPageData {
    let heading = if session.can_review_registrations() {
        "Duyệt đăng ký"
    } else {
        "Đăng ký của tôi"
    };

    let mut error = None;
    let records = match session.registration_scope() {
        Some(scope) => {
            let request = ListRequest::for_session(session);
            match source.list_registrations(session, &scope, &request).await {
                Ok(page) => page.items,
                Err(e) => {
                    warn!(user_id = %session.user_id, error = %e, "registration list fetch failed");
                    error = Some(e.user_message());
                    Vec::new()
                }
            }
        }
        None => {
            error = Some(no_scope_message(session).to_string());
            Vec::new()
        }
    };

    let query = params.to_query(&REGISTRATION_LIST, page_size);
    let derived = derive_list(&records, &REGISTRATION_LIST, &query);
    let chrome = ListChrome::build(
        params,
        REGISTRATION_LIST.categories,
        &derived.counts,
        query.category.key(),
        query.sort,
        &derived.pagination,
    );
    let rows: Vec<RegistrationRowView> = derived
        .visible
        .iter()
        .map(|record| RegistrationRowView::from_record(record, session))
        .collect();

    RegistrationsPageData {
        heading,
        can_review: rows.iter().any(|row| row.can_review),
        show_student: session.can_review_registrations(),
        type_options: select_options(&type_options(&records), params.value("type")),
        rows,
        chrome,
        error,
        return_to: format!(
            "/registrations{}",
            params.href_for_page(&derived.pagination.page)
        ),
    }
}

fn no_scope_message(session: &SessionContext) -> &'static str {
    match session.role {
        Some(Role::ClassMonitor) => "Tài khoản lớp trưởng chưa được gán lớp.",
        _ => "Bạn không có quyền xem danh sách đăng ký.",
    }
}

fn type_options(records: &[RegistrationRecord]) -> Vec<String> {
    distinct_sorted(records.iter().filter_map(|r| r.activity.type_name.as_deref()))
}

/// Fails unless `session` may review every registration in `ids`. Class
/// monitors are checked against their own class list.
async fn ensure_reviewable(
    source: &dyn ListSource,
    session: &SessionContext,
    ids: &[String],
) -> Result<(), CommandFailure> {
    if !session.can_review_registrations() {
        return Err(CommandFailure::new(
            "Bạn không có quyền duyệt đăng ký.",
        ));
    }
    if session.role != Some(Role::ClassMonitor) {
        return Ok(());
    }
    let Some(scope @ RegistrationScope::Class(_)) = session.registration_scope() else {
        return Err(CommandFailure::new(no_scope_message(session)));
    };
    let page = source
        .list_registrations(session, &scope, &ListRequest::for_session(session))
        .await?;
    let allowed: HashSet<&str> = page
        .items
        .iter()
        .filter(|r| session.can_review(r))
        .map(|r| r.id.as_str())
        .collect();
    if ids.iter().all(|id| allowed.contains(id.as_str())) {
        Ok(())
    } else {
        Err(CommandFailure::new(
            "Chỉ được duyệt đăng ký của sinh viên trong lớp mình.",
        ))
    }
}

pub async fn approve(
    source: &dyn ListSource,
    session: &SessionContext,
    registration_id: &str,
) -> CommandOutcome {
    let ids = [registration_id.to_string()];
    ensure_reviewable(source, session, &ids).await?;
    let command = Command::ApproveRegistration {
        registration_id: registration_id.to_string(),
    };
    apply(source, session, command, Notice::Approved).await
}

pub async fn reject(
    source: &dyn ListSource,
    session: &SessionContext,
    registration_id: &str,
    reason: &str,
) -> CommandOutcome {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CommandFailure::new("Vui lòng nhập lý do từ chối."));
    }
    let ids = [registration_id.to_string()];
    ensure_reviewable(source, session, &ids).await?;
    let command = Command::RejectRegistration {
        registration_id: registration_id.to_string(),
        reason: reason.to_string(),
    };
    apply(source, session, command, Notice::Rejected).await
}

/// Approves every selected registration; duplicates and blanks are dropped.
pub async fn bulk_approve(
    source: &dyn ListSource,
    session: &SessionContext,
    registration_ids: &[String],
) -> CommandOutcome {
    let mut ids: Vec<String> = Vec::new();
    for id in registration_ids.iter().map(|id| id.trim()).filter(|id| !id.is_empty()) {
        if !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    if ids.is_empty() {
        return Err(CommandFailure::new("Chưa chọn đăng ký nào."));
    }
    ensure_reviewable(source, session, &ids).await?;
    let command = Command::BulkApprove {
        registration_ids: ids,
    };
    apply(source, session, command, Notice::BulkApproved).await
}
