use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::models::users::{mark_active_now, USER_CATEGORY_MAP};
use crate::models::{NewUser, Role, UserCategory, UserRecord};
use crate::pipeline::{derive_list, Category, Facets, ListConfig, ListParams};
use crate::services::list_view::{
    format_date, format_datetime, select_options, ListChrome, SelectOption,
};
use crate::services::refresh::{apply, CommandFailure, CommandOutcome, Notice};
use crate::session::SessionContext;
use crate::source::{Command, ListRequest, ListSource};

const EMAIL_DOMAIN: &str = "@dlu.edu.vn";

fn display_name(u: &UserRecord) -> Option<&str> {
    u.display_name.as_deref()
}

fn login_name(u: &UserRecord) -> Option<&str> {
    u.login_name.as_deref()
}

fn email(u: &UserRecord) -> Option<&str> {
    u.email.as_deref()
}

fn student_code(u: &UserRecord) -> Option<&str> {
    u.student_code()
}

fn state(u: &UserRecord) -> Option<&str> {
    Some(u.state())
}

fn sort_name(u: &UserRecord) -> Option<&str> {
    u.display_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .or(u.login_name.as_deref())
}

fn created_at(u: &UserRecord) -> Option<DateTime<Utc>> {
    u.created_at
}

fn last_login_at(u: &UserRecord) -> Option<DateTime<Utc>> {
    u.last_login_at
}

fn facets(u: &UserRecord) -> Facets<'_> {
    Facets {
        type_name: u.role.map(Role::label),
        status: Some(u.state()),
        date: u.created_at,
        points: None,
        class_id: u.class_id(),
        student_code: u.student_code(),
    }
}

pub const USER_LIST: ListConfig<UserRecord, UserCategory> = ListConfig {
    text_fields: &[display_name, login_name, email, student_code],
    category_field: state,
    category_map: USER_CATEGORY_MAP,
    categories: &[
        UserCategory::Locked,
        UserCategory::ActiveNow,
        UserCategory::Inactive,
    ],
    timestamp_fields: &[created_at, last_login_at],
    name_field: sort_name,
    facets,
};

pub struct UserRowView {
    pub id: String,
    pub name: String,
    pub login_name: String,
    pub email: String,
    pub role_label: String,
    pub class_label: String,
    pub student_code: String,
    pub created_label: String,
    pub last_login_label: String,
    pub state_key: String,
    pub state_label: String,
    pub locked: bool,
    /// Admins cannot lock or delete themselves.
    pub is_self: bool,
}

impl UserRowView {
    fn from_record(user: &UserRecord, session: &SessionContext) -> Self {
        let category = user.category();
        UserRowView {
            id: user.id.clone(),
            name: user.display_name.clone().unwrap_or_default(),
            login_name: user.login_name.clone().unwrap_or_default(),
            email: user.email.clone().unwrap_or_default(),
            role_label: user.role.map(Role::label).unwrap_or_default().to_string(),
            class_label: user
                .student
                .as_ref()
                .and_then(|s| s.class_name.clone().or_else(|| s.class_id.clone()))
                .unwrap_or_default(),
            student_code: user.student_code().unwrap_or_default().to_string(),
            created_label: format_date(user.created_at),
            last_login_label: format_datetime(user.last_login_at),
            state_key: category.key().to_string(),
            state_label: category.label().to_string(),
            locked: user.locked,
            is_self: user.id == session.user_id,
        }
    }
}

pub struct UsersPageData {
    pub rows: Vec<UserRowView>,
    pub chrome: ListChrome,
    pub role_options: Vec<SelectOption>,
    pub session_count: usize,
    pub error: Option<String>,
    pub return_to: String,
}

pub async fn build_users_page(
    source: &dyn ListSource,
    session: &SessionContext,
    params: &ListParams,
    page_size: usize,
    active_window_minutes: u32,
) -> UsersPageData {
    let mut error = None;
    let mut session_count = 0;
    let mut users = Vec::new();

    if session.can_manage_users() {
        let request = ListRequest::for_session(session);
        let (listed, active) = tokio::join!(
            source.list_users(session, &request),
            source.active_sessions(session, active_window_minutes)
        );
        match listed {
            Ok(page) => users = page.items,
            Err(e) => {
                warn!(user_id = %session.user_id, error = %e, "user list fetch failed");
                error = Some(e.user_message());
            }
        }
        match active {
            Ok(active) => {
                mark_active_now(&mut users, &active.identifiers());
                session_count = active.session_count;
            }
            // Without session data every unlocked account reads as inactive.
            Err(e) => warn!(error = %e, "active session fetch failed"),
        }
    } else {
        error = Some("Chỉ quản trị viên mới được quản lý tài khoản.".to_string());
    }

    let query = params.to_query(&USER_LIST, page_size);
    let derived = derive_list(&users, &USER_LIST, &query);
    let chrome = ListChrome::build(
        params,
        USER_LIST.categories,
        &derived.counts,
        query.category.key(),
        query.sort,
        &derived.pagination,
    );

    UsersPageData {
        rows: derived
            .visible
            .iter()
            .map(|user| UserRowView::from_record(user, session))
            .collect(),
        chrome,
        role_options: select_options(&role_labels(), params.value("type")),
        session_count,
        error,
        return_to: format!("/users{}", params.href_for_page(&derived.pagination.page)),
    }
}

fn role_labels() -> Vec<String> {
    [Role::Admin, Role::Teacher, Role::ClassMonitor, Role::Student]
        .iter()
        .map(|role| role.label().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Mã số phải có ít nhất 3 ký tự.")]
    LoginTooShort,
    #[error("Họ tên phải có ít nhất 2 ký tự.")]
    NameTooShort,
    #[error("Email không hợp lệ.")]
    InvalidEmail,
    #[error("Email phải thuộc tên miền @dlu.edu.vn.")]
    EmailDomain,
    #[error("Mật khẩu phải có ít nhất 6 ký tự.")]
    PasswordTooShort,
    #[error("Vai trò không hợp lệ.")]
    UnknownRole,
    #[error("Tài khoản sinh viên cần có MSSV.")]
    MissingStudentCode,
    #[error("Tài khoản sinh viên cần có lớp.")]
    MissingClass,
}

impl From<ValidationError> for CommandFailure {
    fn from(err: ValidationError) -> Self {
        CommandFailure::new(err.to_string())
    }
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Checks the account form and returns the role it asks for.
pub fn validate_new_user(user: &NewUser) -> Result<Role, ValidationError> {
    if char_len(&user.login_name) < 3 {
        return Err(ValidationError::LoginTooShort);
    }
    if char_len(&user.full_name) < 2 {
        return Err(ValidationError::NameTooShort);
    }
    let email = user.email.trim();
    if !is_email(email) {
        return Err(ValidationError::InvalidEmail);
    }
    if !email.to_lowercase().ends_with(EMAIL_DOMAIN) {
        return Err(ValidationError::EmailDomain);
    }
    if user.password.chars().count() < 6 {
        return Err(ValidationError::PasswordTooShort);
    }
    let role = Role::normalize(&user.role).ok_or(ValidationError::UnknownRole)?;
    if role.is_student_like() {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |v| v.trim().is_empty());
        if blank(&user.student_code) {
            return Err(ValidationError::MissingStudentCode);
        }
        if blank(&user.class_id) {
            return Err(ValidationError::MissingClass);
        }
    }
    Ok(role)
}

fn require_admin(session: &SessionContext) -> Result<(), CommandFailure> {
    if session.can_manage_users() {
        Ok(())
    } else {
        Err(CommandFailure::new(
            "Chỉ quản trị viên mới được quản lý tài khoản.",
        ))
    }
}

pub async fn create_user(
    source: &dyn ListSource,
    session: &SessionContext,
    user: NewUser,
) -> CommandOutcome {
    require_admin(session)?;
    let role = validate_new_user(&user)?;
    apply(source, session, Command::CreateUser { user, role }, Notice::UserCreated).await
}

pub async fn set_locked(
    source: &dyn ListSource,
    session: &SessionContext,
    user_id: &str,
    locked: bool,
) -> CommandOutcome {
    require_admin(session)?;
    if locked && user_id == session.user_id {
        return Err(CommandFailure::new("Không thể tự khóa tài khoản của mình."));
    }
    let notice = if locked {
        Notice::UserLocked
    } else {
        Notice::UserUnlocked
    };
    let command = Command::SetUserLocked {
        user_id: user_id.to_string(),
        locked,
    };
    apply(source, session, command, notice).await
}

pub async fn delete_user(
    source: &dyn ListSource,
    session: &SessionContext,
    user_id: &str,
) -> CommandOutcome {
    require_admin(session)?;
    if user_id == session.user_id {
        return Err(CommandFailure::new("Không thể xóa tài khoản đang đăng nhập."));
    }
    let command = Command::DeleteUser {
        user_id: user_id.to_string(),
    };
    apply(source, session, command, Notice::UserDeleted).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::tests::user;
    use crate::source::snapshot::{SnapshotData, SnapshotSource};
    use crate::source::ActiveSessions;

    fn admin() -> SessionContext {
        SessionContext {
            user_id: "admin".to_string(),
            role: Some(Role::Admin),
            ..SessionContext::default()
        }
    }

    fn form() -> NewUser {
        NewUser {
            login_name: "2112345".to_string(),
            full_name: "Trần Văn B".to_string(),
            email: "2112345@dlu.edu.vn".to_string(),
            password: "matkhau".to_string(),
            role: "Sinh viên".to_string(),
            student_code: Some("2112345".to_string()),
            class_id: Some("CTK45A".to_string()),
            ..NewUser::default()
        }
    }

    #[test]
    fn valid_form_yields_its_role() {
        assert_eq!(validate_new_user(&form()), Ok(Role::Student));
        let teacher = NewUser {
            role: "GIANG_VIEN".to_string(),
            student_code: None,
            class_id: None,
            ..form()
        };
        assert_eq!(validate_new_user(&teacher), Ok(Role::Teacher));
    }

    #[test]
    fn each_rule_reports_its_own_error() {
        let cases = [
            (NewUser { login_name: "ab".into(), ..form() }, ValidationError::LoginTooShort),
            (NewUser { full_name: " A ".into(), ..form() }, ValidationError::NameTooShort),
            (NewUser { email: "no-at-sign".into(), ..form() }, ValidationError::InvalidEmail),
            (NewUser { email: "a@gmail.com".into(), ..form() }, ValidationError::EmailDomain),
            (NewUser { password: "12345".into(), ..form() }, ValidationError::PasswordTooShort),
            (NewUser { role: "guest".into(), ..form() }, ValidationError::UnknownRole),
            (NewUser { student_code: None, ..form() }, ValidationError::MissingStudentCode),
            (
                NewUser { role: "LOP_TRUONG".into(), class_id: Some(" ".into()), ..form() },
                ValidationError::MissingClass,
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(validate_new_user(&input), Err(expected));
        }
    }

    #[tokio::test]
    async fn page_marks_active_users_and_counts_states() {
        let mut locked = user("u3", "Cường");
        locked.locked = true;
        let mut online = user("u2", "Bình");
        online.login_name = Some("2110002".to_string());
        let src = SnapshotSource::new(SnapshotData {
            users: vec![user("u1", "An"), online, locked],
            active_sessions: ActiveSessions {
                user_codes: ["2110002".to_string()].into_iter().collect(),
                session_count: 1,
                ..ActiveSessions::default()
            },
            ..SnapshotData::default()
        });

        let page = build_users_page(&src, &admin(), &ListParams::default(), 20, 5).await;
        assert_eq!(page.session_count, 1);
        let count = |key: &str| page.chrome.tabs.iter().find(|t| t.key == key).unwrap().count;
        assert_eq!(count("all"), 3);
        assert_eq!(count("locked"), 1);
        assert_eq!(count("active"), 1);
        assert_eq!(count("inactive"), 1);
    }

    #[tokio::test]
    async fn non_admins_get_nothing() {
        let src = SnapshotSource::new(SnapshotData {
            users: vec![user("u1", "An")],
            ..SnapshotData::default()
        });
        let teacher = SessionContext {
            role: Some(Role::Teacher),
            ..admin()
        };
        let page = build_users_page(&src, &teacher, &ListParams::default(), 20, 5).await;
        assert!(page.rows.is_empty());
        assert!(page.error.is_some());
        assert!(delete_user(&src, &teacher, "u1").await.is_err());
    }

    #[tokio::test]
    async fn commands_update_the_snapshot() {
        let src = SnapshotSource::new(SnapshotData {
            users: vec![user("u1", "An")],
            ..SnapshotData::default()
        });
        assert_eq!(create_user(&src, &admin(), form()).await, Ok(Notice::UserCreated));
        assert!(create_user(&src, &admin(), form()).await.is_err(), "duplicate login");
        assert_eq!(set_locked(&src, &admin(), "u1", true).await, Ok(Notice::UserLocked));
        assert!(set_locked(&src, &admin(), "admin", true).await.is_err());
        assert_eq!(delete_user(&src, &admin(), "u1").await, Ok(Notice::UserDeleted));

        let data = src.data().await;
        assert_eq!(data.users.len(), 1);
        assert_eq!(data.users[0].login_name.as_deref(), Some("2112345"));
        assert!(src.login("2112345", "matkhau").await.is_ok());
    }
}
