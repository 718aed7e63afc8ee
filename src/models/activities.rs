use chrono::{DateTime, Utc};

use crate::models::{lookup_status, Role, UNKNOWN_STATUS_LABEL};
use crate::pipeline::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActivityStatus {
    PendingApproval,
    Approved,
    Rejected,
    Ended,
}

pub const ACTIVITY_STATUS_MAP: &[(&str, ActivityStatus)] = &[
    ("cho_duyet", ActivityStatus::PendingApproval),
    ("pending", ActivityStatus::PendingApproval),
    ("pending_approval", ActivityStatus::PendingApproval),
    ("da_duyet", ActivityStatus::Approved),
    ("approved", ActivityStatus::Approved),
    ("tu_choi", ActivityStatus::Rejected),
    ("rejected", ActivityStatus::Rejected),
    ("ket_thuc", ActivityStatus::Ended),
    ("ended", ActivityStatus::Ended),
];

impl ActivityStatus {
    pub const ALL: [ActivityStatus; 4] = [
        ActivityStatus::PendingApproval,
        ActivityStatus::Approved,
        ActivityStatus::Rejected,
        ActivityStatus::Ended,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        lookup_status(ACTIVITY_STATUS_MAP, raw)
    }

    /// Value the REST API uses for this status.
    pub fn as_wire(self) -> &'static str {
        match self {
            ActivityStatus::PendingApproval => "cho_duyet",
            ActivityStatus::Approved => "da_duyet",
            ActivityStatus::Rejected => "tu_choi",
            ActivityStatus::Ended => "ket_thuc",
        }
    }
}

impl Category for ActivityStatus {
    fn key(self) -> &'static str {
        match self {
            ActivityStatus::PendingApproval => "pending",
            ActivityStatus::Approved => "approved",
            ActivityStatus::Rejected => "rejected",
            ActivityStatus::Ended => "ended",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ActivityStatus::PendingApproval => "Chờ duyệt",
            ActivityStatus::Approved => "Đã duyệt",
            ActivityStatus::Rejected => "Từ chối",
            ActivityStatus::Ended => "Kết thúc",
        }
    }
}

/// Label for a raw activity status. Cancelled activities have no bucket but
/// still get their own label.
pub fn activity_status_label(raw: &str) -> &'static str {
    if let Some(status) = ActivityStatus::parse(raw) {
        return status.label();
    }
    match crate::models::normalize_status_key(raw).as_str() {
        "da_huy" | "cancelled" => "Đã hủy",
        _ => UNKNOWN_STATUS_LABEL,
    }
}

/// Registration state of the viewing user for one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewerRegistration {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
    Attended,
}

impl ViewerRegistration {
    pub fn parse(raw: Option<&str>) -> Self {
        use crate::models::RegistrationStatus;

        match raw.and_then(RegistrationStatus::parse) {
            Some(RegistrationStatus::Pending) => ViewerRegistration::Pending,
            Some(RegistrationStatus::Approved) => ViewerRegistration::Approved,
            Some(RegistrationStatus::Rejected) => ViewerRegistration::Rejected,
            Some(RegistrationStatus::Attended) => ViewerRegistration::Attended,
            None => ViewerRegistration::None,
        }
    }

    pub fn is_registered(self) -> bool {
        !matches!(self, ViewerRegistration::None)
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            ViewerRegistration::None => None,
            ViewerRegistration::Pending => Some("Chờ duyệt"),
            ViewerRegistration::Approved => Some("Đã duyệt"),
            ViewerRegistration::Rejected => Some("Từ chối"),
            ViewerRegistration::Attended => Some("Đã tham gia"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub id: String,
    pub title: String,
    pub code: Option<String>,
    pub type_name: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub capacity: Option<i64>,
    pub registered_count: Option<i64>,
    pub points: Option<f64>,
    pub organizer: Option<String>,
    pub status: String,
    pub viewer_status: ViewerRegistration,
    pub semester: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ActivityRecord {
    pub fn status(&self) -> Option<ActivityStatus> {
        ActivityStatus::parse(&self.status)
    }

    pub fn is_full(&self) -> bool {
        match (self.capacity, self.registered_count) {
            (Some(cap), Some(count)) => cap > 0 && count >= cap,
            _ => false,
        }
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.or(self.starts_at).is_some_and(|end| end < now)
    }

    /// Why nobody can sign up for this activity at `now`, if anything blocks it.
    pub fn registration_block(&self, now: DateTime<Utc>) -> Option<&'static str> {
        if self.status() != Some(ActivityStatus::Approved) {
            return Some("Hoạt động chưa được duyệt, không thể đăng ký.");
        }
        if self.is_past(now) {
            return Some("Hoạt động đã kết thúc.");
        }
        if self.registration_deadline.is_some_and(|deadline| deadline < now) {
            return Some("Đã hết hạn đăng ký cho hoạt động này.");
        }
        if self.starts_at.is_some_and(|start| now >= start) {
            return Some("Hoạt động đã bắt đầu, không thể đăng ký.");
        }
        None
    }

    /// Whether a user with `role` may still sign up at `now`.
    pub fn can_register(&self, role: Option<Role>, now: DateTime<Utc>) -> bool {
        if matches!(role, Some(Role::Teacher) | Some(Role::Admin)) {
            return false;
        }
        self.registration_block(now).is_none()
            && matches!(
                self.viewer_status,
                ViewerRegistration::None | ViewerRegistration::Rejected
            )
    }

    /// Only a sign-up still waiting for review can be withdrawn, and only before start.
    pub fn can_cancel(&self, now: DateTime<Utc>) -> bool {
        self.viewer_status == ViewerRegistration::Pending
            && !self.starts_at.is_some_and(|start| now >= start)
    }

    /// Activities awaiting a decision can be approved or rejected.
    pub fn awaits_review(&self) -> bool {
        self.status() == Some(ActivityStatus::PendingApproval)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn activity(id: &str, title: &str) -> ActivityRecord {
        ActivityRecord {
            id: id.to_string(),
            title: title.to_string(),
            code: None,
            type_name: None,
            starts_at: None,
            ends_at: None,
            registration_deadline: None,
            capacity: None,
            registered_count: None,
            points: None,
            organizer: None,
            status: "da_duyet".to_string(),
            viewer_status: ViewerRegistration::None,
            semester: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, 8, 0, 0).unwrap()
    }

    #[test]
    fn status_synonyms_map_to_one_bucket() {
        assert_eq!(ActivityStatus::parse("da_duyet"), Some(ActivityStatus::Approved));
        assert_eq!(ActivityStatus::parse("Approved"), Some(ActivityStatus::Approved));
        assert_eq!(ActivityStatus::parse("da_huy"), None);
        assert_eq!(activity_status_label("da_huy"), "Đã hủy");
        assert_eq!(activity_status_label("???"), UNKNOWN_STATUS_LABEL);
    }

    #[test]
    fn registration_window_rules() {
        let mut a = activity("a1", "Hiến máu");
        a.starts_at = Some(at(20));
        a.ends_at = Some(at(21));
        a.registration_deadline = Some(at(15));

        assert!(a.can_register(Some(Role::Student), at(10)));
        assert!(a.can_register(Some(Role::ClassMonitor), at(10)));
        assert!(!a.can_register(Some(Role::Teacher), at(10)));
        assert!(!a.can_register(Some(Role::Student), at(16)), "deadline passed");
        assert!(!a.can_register(Some(Role::Student), at(22)), "activity over");

        a.viewer_status = ViewerRegistration::Pending;
        assert!(!a.can_register(Some(Role::Student), at(10)));
        assert!(a.can_cancel(at(10)));

        a.viewer_status = ViewerRegistration::Rejected;
        assert!(a.can_register(Some(Role::Student), at(10)));

        a.status = "cho_duyet".to_string();
        assert!(!a.can_register(Some(Role::Student), at(10)));
        assert!(a.awaits_review());
    }

    #[test]
    fn approved_sign_ups_cannot_be_cancelled() {
        let mut a = activity("a1", "Hiến máu");
        a.starts_at = Some(at(20));

        a.viewer_status = ViewerRegistration::Approved;
        assert!(!a.can_cancel(at(10)));
        a.viewer_status = ViewerRegistration::Attended;
        assert!(!a.can_cancel(at(10)));
        a.viewer_status = ViewerRegistration::Pending;
        assert!(!a.can_cancel(at(20)), "already started");
    }

    #[test]
    fn registration_block_names_the_first_reason() {
        let mut a = activity("a1", "Hiến máu");
        a.starts_at = Some(at(20));
        a.registration_deadline = Some(at(15));

        assert_eq!(a.registration_block(at(10)), None);
        assert_eq!(
            a.registration_block(at(16)),
            Some("Đã hết hạn đăng ký cho hoạt động này.")
        );
        a.status = "cho_duyet".to_string();
        assert_eq!(
            a.registration_block(at(10)),
            Some("Hoạt động chưa được duyệt, không thể đăng ký.")
        );
    }

    #[test]
    fn full_only_when_capacity_known() {
        let mut a = activity("a1", "x");
        assert!(!a.is_full());
        a.capacity = Some(2);
        a.registered_count = Some(2);
        assert!(a.is_full());
    }
}
