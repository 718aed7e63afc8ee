//! Where list records come from.
//!
//! The portal's REST API owns all data. [`RestSource`] talks to it;
//! [`SnapshotSource`] serves the same shapes from a JSON file for offline
//! runs and tests.

pub mod envelope;
pub mod rest;
pub mod snapshot;
pub mod wire;

use std::collections::HashSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{ActivityRecord, NewUser, RegistrationRecord, Role, UserRecord};
use crate::session::SessionContext;

pub use envelope::RecordPage;
pub use rest::RestSource;
pub use snapshot::SnapshotSource;

/// How many records a list page fetches before deriving locally.
pub const FETCH_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub semester: Option<String>,
    pub page: usize,
    pub limit: usize,
}

impl Default for ListRequest {
    fn default() -> Self {
        ListRequest {
            semester: None,
            page: 1,
            limit: FETCH_LIMIT,
        }
    }
}

impl ListRequest {
    pub fn for_session(session: &SessionContext) -> Self {
        ListRequest {
            semester: session.semester.clone(),
            ..ListRequest::default()
        }
    }
}

/// Which registrations a listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationScope {
    All,
    /// Registrations for the classes a teacher supervises.
    Teacher,
    Class(String),
    /// The session user's own registrations.
    Own,
}

/// Users with a session inside the active window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSessions {
    pub user_ids: HashSet<String>,
    pub user_codes: HashSet<String>,
    pub session_count: usize,
}

impl ActiveSessions {
    pub fn identifiers(&self) -> HashSet<String> {
        self.user_ids.union(&self.user_codes).cloned().collect()
    }
}

/// Result of a successful sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub token: String,
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

/// A mutation. Each one succeeds or fails as a whole; callers refresh the
/// list afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    RegisterActivity { activity_id: String },
    CancelRegistration { activity_id: String },
    ApproveActivity { activity_id: String },
    RejectActivity { activity_id: String, reason: String },
    ApproveRegistration { registration_id: String },
    RejectRegistration { registration_id: String, reason: String },
    BulkApprove { registration_ids: Vec<String> },
    CreateUser { user: NewUser, role: Role },
    SetUserLocked { user_id: String, locked: bool },
    DeleteUser { user_id: String },
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::RegisterActivity { .. } => "register_activity",
            Command::CancelRegistration { .. } => "cancel_registration",
            Command::ApproveActivity { .. } => "approve_activity",
            Command::RejectActivity { .. } => "reject_activity",
            Command::ApproveRegistration { .. } => "approve_registration",
            Command::RejectRegistration { .. } => "reject_registration",
            Command::BulkApprove { .. } => "bulk_approve",
            Command::CreateUser { .. } => "create_user",
            Command::SetUserLocked { locked: true, .. } => "lock_user",
            Command::SetUserLocked { locked: false, .. } => "unlock_user",
            Command::DeleteUser { .. } => "delete_user",
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not reach {url}: {message}")]
    Connect { url: String, message: String },
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not allowed: {0}")]
    Forbidden(String),
    #[error("snapshot: {0}")]
    Snapshot(String),
}

impl SourceError {
    /// Message safe to show to the user.
    pub fn user_message(&self) -> String {
        match self {
            SourceError::Connect { .. } => "Không thể kết nối tới máy chủ.".to_string(),
            SourceError::Upstream { message, .. } if !message.trim().is_empty() => {
                message.clone()
            }
            SourceError::NotFound(_) => "Không tìm thấy dữ liệu.".to_string(),
            SourceError::Forbidden(_) => "Bạn không có quyền thực hiện thao tác này.".to_string(),
            _ => "Đã có lỗi xảy ra.".to_string(),
        }
    }
}

#[async_trait]
pub trait ListSource: Send + Sync {
    async fn login(&self, login_name: &str, password: &str) -> Result<LoginOutcome, SourceError>;

    async fn list_activities(
        &self,
        session: &SessionContext,
        request: &ListRequest,
    ) -> Result<RecordPage<ActivityRecord>, SourceError>;

    async fn list_registrations(
        &self,
        session: &SessionContext,
        scope: &RegistrationScope,
        request: &ListRequest,
    ) -> Result<RecordPage<RegistrationRecord>, SourceError>;

    async fn list_users(
        &self,
        session: &SessionContext,
        request: &ListRequest,
    ) -> Result<RecordPage<UserRecord>, SourceError>;

    async fn active_sessions(
        &self,
        session: &SessionContext,
        window_minutes: u32,
    ) -> Result<ActiveSessions, SourceError>;

    async fn list_activity_types(&self, session: &SessionContext)
        -> Result<Vec<String>, SourceError>;

    async fn execute(&self, session: &SessionContext, command: Command)
        -> Result<(), SourceError>;
}
