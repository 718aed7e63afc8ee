use chrono::{DateTime, Utc};

use crate::models::{lookup_status, Role, UNKNOWN_STATUS_LABEL};
use crate::pipeline::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
    Attended,
}

pub const REGISTRATION_STATUS_MAP: &[(&str, RegistrationStatus)] = &[
    ("cho_duyet", RegistrationStatus::Pending),
    ("pending", RegistrationStatus::Pending),
    ("da_duyet", RegistrationStatus::Approved),
    ("approved", RegistrationStatus::Approved),
    ("tu_choi", RegistrationStatus::Rejected),
    ("rejected", RegistrationStatus::Rejected),
    ("da_tham_gia", RegistrationStatus::Attended),
    ("attended", RegistrationStatus::Attended),
    ("participated", RegistrationStatus::Attended),
];

impl RegistrationStatus {
    pub const ALL: [RegistrationStatus; 4] = [
        RegistrationStatus::Pending,
        RegistrationStatus::Approved,
        RegistrationStatus::Rejected,
        RegistrationStatus::Attended,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        lookup_status(REGISTRATION_STATUS_MAP, raw)
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "cho_duyet",
            RegistrationStatus::Approved => "da_duyet",
            RegistrationStatus::Rejected => "tu_choi",
            RegistrationStatus::Attended => "da_tham_gia",
        }
    }
}

impl Category for RegistrationStatus {
    fn key(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Approved => "approved",
            RegistrationStatus::Rejected => "rejected",
            RegistrationStatus::Attended => "attended",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "Chờ duyệt",
            RegistrationStatus::Approved => "Đã duyệt",
            RegistrationStatus::Rejected => "Từ chối",
            RegistrationStatus::Attended => "Đã tham gia",
        }
    }
}

pub fn registration_status_label(raw: &str) -> &'static str {
    RegistrationStatus::parse(raw)
        .map(|status| status.label())
        .unwrap_or(UNKNOWN_STATUS_LABEL)
}

/// Activity fields embedded in a registration row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityRef {
    pub id: Option<String>,
    pub title: Option<String>,
    pub code: Option<String>,
    pub type_name: Option<String>,
    pub points: Option<f64>,
    pub starts_at: Option<DateTime<Utc>>,
}

/// Student fields embedded in a registration row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentRef {
    pub id: Option<String>,
    pub name: Option<String>,
    pub student_code: Option<String>,
    pub class_id: Option<String>,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRecord {
    pub id: String,
    pub activity: ActivityRef,
    pub student: StudentRef,
    pub status: String,
    pub registered_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub approver_role: Option<Role>,
}

impl RegistrationRecord {
    pub fn status(&self) -> Option<RegistrationStatus> {
        RegistrationStatus::parse(&self.status)
    }

    pub fn status_label(&self) -> &'static str {
        registration_status_label(&self.status)
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Some(RegistrationStatus::Pending)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn registration(id: &str, status: &str) -> RegistrationRecord {
        RegistrationRecord {
            id: id.to_string(),
            activity: ActivityRef::default(),
            student: StudentRef::default(),
            status: status.to_string(),
            registered_at: None,
            approved_at: None,
            updated_at: None,
            created_at: None,
            rejection_reason: None,
            approver_role: None,
        }
    }

    #[test]
    fn unknown_status_falls_back_to_default_label() {
        assert_eq!(registration("r1", "da_tham_gia").status_label(), "Đã tham gia");
        assert_eq!(
            registration("r2", "unknown_value").status_label(),
            UNKNOWN_STATUS_LABEL
        );
        assert_eq!(registration("r3", "").status_label(), UNKNOWN_STATUS_LABEL);
    }

    #[test]
    fn pending_detection_uses_synonyms() {
        assert!(registration("r1", "PENDING").is_pending());
        assert!(!registration("r1", "da_duyet").is_pending());
    }
}
