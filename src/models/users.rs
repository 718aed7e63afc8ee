use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::models::Role;
use crate::pipeline::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum UserCategory {
    Locked,
    ActiveNow,
    Inactive,
}

pub const USER_CATEGORY_MAP: &[(&str, UserCategory)] = &[
    ("khoa", UserCategory::Locked),
    ("locked", UserCategory::Locked),
    ("hoat_dong", UserCategory::ActiveNow),
    ("active", UserCategory::ActiveNow),
    ("khong_hoat_dong", UserCategory::Inactive),
    ("inactive", UserCategory::Inactive),
];

impl Category for UserCategory {
    fn key(self) -> &'static str {
        match self {
            UserCategory::Locked => "locked",
            UserCategory::ActiveNow => "active",
            UserCategory::Inactive => "inactive",
        }
    }

    fn label(self) -> &'static str {
        match self {
            UserCategory::Locked => "Bị khóa",
            UserCategory::ActiveNow => "Đang hoạt động",
            UserCategory::Inactive => "Không hoạt động",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentProfile {
    pub student_code: Option<String>,
    pub class_id: Option<String>,
    pub class_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub display_name: Option<String>,
    pub login_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub locked: bool,
    pub active_now: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub student: Option<StudentProfile>,
}

impl UserRecord {
    /// Wire value of the derived account state.
    pub fn state(&self) -> &'static str {
        if self.locked {
            "khoa"
        } else if self.active_now {
            "hoat_dong"
        } else {
            "khong_hoat_dong"
        }
    }

    pub fn category(&self) -> UserCategory {
        if self.locked {
            UserCategory::Locked
        } else if self.active_now {
            UserCategory::ActiveNow
        } else {
            UserCategory::Inactive
        }
    }

    pub fn student_code(&self) -> Option<&str> {
        self.student.as_ref()?.student_code.as_deref()
    }

    pub fn class_id(&self) -> Option<&str> {
        self.student.as_ref()?.class_id.as_deref()
    }
}

/// Flags users that currently hold a session. Matches by user id or login code.
pub fn mark_active_now(users: &mut [UserRecord], active: &HashSet<String>) {
    for user in users.iter_mut() {
        let by_id = active.contains(&user.id);
        let by_login = user
            .login_name
            .as_ref()
            .is_some_and(|login| active.contains(login));
        user.active_now = by_id || by_login;
    }
}

/// Account creation form as submitted by an admin.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewUser {
    pub login_name: String,
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub student_code: Option<String>,
    pub class_id: Option<String>,
    pub phone: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
}
