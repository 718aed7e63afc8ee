use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::models::{
    ActivityRecord, ActivityRef, ActivityStatus, RegistrationRecord, RegistrationStatus, StudentProfile,
    StudentRef, UserRecord, ViewerRegistration,
};
use crate::session::{SessionContext, TokenClaims};

use super::envelope::{map_page, RecordPage};
use super::wire;
use super::{
    ActiveSessions, Command, ListRequest, ListSource, LoginOutcome, RegistrationScope,
    SourceError,
};

/// Records served by [`SnapshotSource`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotData {
    pub activities: Vec<ActivityRecord>,
    pub registrations: Vec<RegistrationRecord>,
    pub users: Vec<UserRecord>,
    pub activity_types: Vec<String>,
    pub active_sessions: ActiveSessions,
    /// `(login name, password)` pairs accepted by `login`.
    pub credentials: Vec<(String, String)>,
}

impl SnapshotData {
    /// Reads a snapshot document. Each list uses the same shapes and field
    /// names as the REST API.
    pub fn from_json(doc: &Value) -> Self {
        let list = |key: &str| doc.get(key).cloned().unwrap_or(Value::Null);
        let activities = map_page(&list("activities"), &[], "activity", wire::activity_from_value);
        let registrations = map_page(
            &list("registrations"),
            &[],
            "registration",
            wire::registration_from_value,
        );
        let users = map_page(&list("users"), &[], "user", wire::user_from_value);

        let credentials = doc
            .get("credentials")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| {
                        Some((
                            wire::text(c, &["maso", "login"])?,
                            wire::text(c, &["password"])?,
                        ))
                    })
                    .collect()
            })
            .unwrap_or_default();

        SnapshotData {
            activities: activities.map(|p| p.items).unwrap_or_default(),
            registrations: registrations.map(|p| p.items).unwrap_or_default(),
            users: users.map(|p| p.items).unwrap_or_default(),
            activity_types: wire::activity_types_from_value(&list("activity_types")),
            active_sessions: doc
                .get("active_sessions")
                .map(wire::active_sessions_from_value)
                .unwrap_or_default(),
            credentials,
        }
    }
}

/// In-memory source for offline runs and tests. Commands mutate the data
/// the same way the API would.
pub struct SnapshotSource {
    data: RwLock<SnapshotData>,
}

impl SnapshotSource {
    pub fn new(data: SnapshotData) -> Self {
        SnapshotSource {
            data: RwLock::new(data),
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SourceError::Snapshot(format!("{}: {e}", path.display())))?;
        let doc: Value = serde_json::from_str(&raw)
            .map_err(|e| SourceError::Snapshot(format!("{}: {e}", path.display())))?;
        let data = SnapshotData::from_json(&doc);
        info!(
            path = %path.display(),
            activities = data.activities.len(),
            registrations = data.registrations.len(),
            users = data.users.len(),
            "loaded snapshot"
        );
        Ok(SnapshotSource::new(data))
    }

    pub async fn data(&self) -> SnapshotData {
        self.data.read().await.clone()
    }
}

fn page<R>(items: Vec<R>, request: &ListRequest) -> RecordPage<R> {
    let total = items.len();
    let limit = request.limit.max(1);
    let page = request.page.max(1);
    let items = items
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();
    RecordPage {
        items,
        total,
        page,
        limit,
    }
}

fn rejected(message: &str) -> SourceError {
    SourceError::Upstream {
        status: 400,
        message: message.to_string(),
    }
}

fn is_own(registration: &RegistrationRecord, session: &SessionContext) -> bool {
    registration.student.id.as_deref() == Some(session.user_id.as_str())
}

fn viewer_status(
    registrations: &[RegistrationRecord],
    activity_id: &str,
    session: &SessionContext,
) -> ViewerRegistration {
    registrations
        .iter()
        .rev()
        .find(|r| r.activity.id.as_deref() == Some(activity_id) && is_own(r, session))
        .map(|r| ViewerRegistration::parse(Some(r.status.as_str())))
        .unwrap_or_default()
}

fn semester_matches(activity: &ActivityRecord, request: &ListRequest) -> bool {
    match (request.semester.as_deref(), activity.semester.as_deref()) {
        (Some(wanted), Some(actual)) => wanted.trim().eq_ignore_ascii_case(actual.trim()),
        _ => true,
    }
}

fn review(
    data: &mut SnapshotData,
    session: &SessionContext,
    registration_id: &str,
    to: RegistrationStatus,
    reason: Option<String>,
) -> Result<(), SourceError> {
    let registration = data
        .registrations
        .iter_mut()
        .find(|r| r.id == registration_id)
        .ok_or_else(|| SourceError::NotFound(format!("registration {registration_id}")))?;
    if !registration.is_pending() {
        return Err(rejected("Đăng ký không ở trạng thái chờ duyệt."));
    }
    let now = Utc::now();
    registration.status = to.as_wire().to_string();
    registration.updated_at = Some(now);
    registration.approver_role = session.role;
    if to == RegistrationStatus::Approved {
        registration.approved_at = Some(now);
    }
    registration.rejection_reason = reason;
    Ok(())
}

fn register(
    data: &mut SnapshotData,
    session: &SessionContext,
    activity_id: &str,
) -> Result<(), SourceError> {
    let activity = data
        .activities
        .iter()
        .find(|a| a.id == activity_id)
        .ok_or_else(|| SourceError::NotFound(format!("activity {activity_id}")))?;
    if let Some(reason) = activity.registration_block(Utc::now()) {
        return Err(rejected(reason));
    }
    let already = data.registrations.iter().any(|r| {
        r.activity.id.as_deref() == Some(activity_id)
            && is_own(r, session)
            && r.status() != Some(RegistrationStatus::Rejected)
    });
    if already {
        return Err(rejected("Bạn đã đăng ký hoạt động này."));
    }
    if activity.is_full() {
        return Err(rejected("Hoạt động đã đủ số lượng."));
    }

    let profile: Option<&StudentProfile> = data
        .users
        .iter()
        .find(|u| u.id == session.user_id)
        .and_then(|u| u.student.as_ref());
    let now = Utc::now();
    let registration = RegistrationRecord {
        id: Uuid::new_v4().to_string(),
        activity: ActivityRef {
            id: Some(activity.id.clone()),
            title: Some(activity.title.clone()),
            code: activity.code.clone(),
            type_name: activity.type_name.clone(),
            points: activity.points,
            starts_at: activity.starts_at,
        },
        student: StudentRef {
            id: Some(session.user_id.clone()),
            name: session.display_name.clone(),
            student_code: profile.and_then(|p| p.student_code.clone()),
            class_id: profile
                .and_then(|p| p.class_id.clone())
                .or_else(|| session.class_id.clone()),
            class_name: profile.and_then(|p| p.class_name.clone()),
        },
        status: RegistrationStatus::Pending.as_wire().to_string(),
        registered_at: Some(now),
        approved_at: None,
        updated_at: None,
        created_at: Some(now),
        rejection_reason: None,
        approver_role: None,
    };
    data.registrations.push(registration);
    if let Some(activity) = data.activities.iter_mut().find(|a| a.id == activity_id) {
        activity.registered_count = Some(activity.registered_count.unwrap_or(0) + 1);
    }
    Ok(())
}

fn cancel(
    data: &mut SnapshotData,
    session: &SessionContext,
    activity_id: &str,
) -> Result<(), SourceError> {
    let position = data
        .registrations
        .iter()
        .rposition(|r| {
            r.activity.id.as_deref() == Some(activity_id)
                && is_own(r, session)
                && r.status() != Some(RegistrationStatus::Rejected)
        })
        .ok_or_else(|| SourceError::NotFound(format!("registration for {activity_id}")))?;
    if !data.registrations[position].is_pending() {
        return Err(rejected(
            "Không thể hủy đăng ký đã được duyệt hoặc đã tham gia.",
        ));
    }
    data.registrations.remove(position);
    if let Some(activity) = data.activities.iter_mut().find(|a| a.id == activity_id) {
        activity.registered_count = activity.registered_count.map(|n| (n - 1).max(0));
    }
    Ok(())
}

fn review_activity(
    data: &mut SnapshotData,
    activity_id: &str,
    to: ActivityStatus,
) -> Result<(), SourceError> {
    let activity = data
        .activities
        .iter_mut()
        .find(|a| a.id == activity_id)
        .ok_or_else(|| SourceError::NotFound(format!("activity {activity_id}")))?;
    match (activity.status(), to) {
        (Some(ActivityStatus::Approved), ActivityStatus::Approved) => {
            return Err(rejected("Hoạt động đã được duyệt."));
        }
        (Some(ActivityStatus::Rejected), ActivityStatus::Rejected) => {
            return Err(rejected("Hoạt động đã bị từ chối."));
        }
        (Some(ActivityStatus::Ended), _) => {
            return Err(rejected("Hoạt động đã kết thúc."));
        }
        _ => {}
    }
    activity.status = to.as_wire().to_string();
    activity.updated_at = Some(Utc::now());
    Ok(())
}

#[async_trait]
impl ListSource for SnapshotSource {
    async fn login(&self, login_name: &str, password: &str) -> Result<LoginOutcome, SourceError> {
        let data = self.data.read().await;
        let login_name = login_name.trim();
        let accepted = data
            .credentials
            .iter()
            .any(|(login, secret)| login.eq_ignore_ascii_case(login_name) && secret == password);
        let user = data
            .users
            .iter()
            .find(|u| {
                u.login_name
                    .as_deref()
                    .is_some_and(|l| l.eq_ignore_ascii_case(login_name))
            })
            .filter(|_| accepted)
            .ok_or_else(|| SourceError::Forbidden("Sai tên đăng nhập hoặc mật khẩu.".to_string()))?;
        if user.locked {
            return Err(SourceError::Forbidden("Tài khoản đã bị khóa.".to_string()));
        }

        let claims = TokenClaims {
            sub: user.id.clone(),
            name: user.display_name.clone(),
            role: user.role.map(|r| r.code().to_string()),
            class_id: user.class_id().map(str::to_string),
        };
        Ok(LoginOutcome {
            token: claims.encode_unsigned(),
            display_name: user.display_name.clone(),
            role: user.role,
        })
    }

    async fn list_activities(
        &self,
        session: &SessionContext,
        request: &ListRequest,
    ) -> Result<RecordPage<ActivityRecord>, SourceError> {
        let data = self.data.read().await;
        let items: Vec<ActivityRecord> = data
            .activities
            .iter()
            .filter(|a| semester_matches(a, request))
            .map(|a| {
                let mut a = a.clone();
                a.viewer_status = viewer_status(&data.registrations, &a.id, session);
                a
            })
            .collect();
        Ok(page(items, request))
    }

    async fn list_registrations(
        &self,
        session: &SessionContext,
        scope: &RegistrationScope,
        request: &ListRequest,
    ) -> Result<RecordPage<RegistrationRecord>, SourceError> {
        let data = self.data.read().await;
        let items: Vec<RegistrationRecord> = data
            .registrations
            .iter()
            .filter(|r| match scope {
                RegistrationScope::All | RegistrationScope::Teacher => true,
                RegistrationScope::Class(class_id) => {
                    r.student.class_id.as_deref().map(str::trim) == Some(class_id.trim())
                }
                RegistrationScope::Own => is_own(r, session),
            })
            .cloned()
            .collect();
        Ok(page(items, request))
    }

    async fn list_users(
        &self,
        _session: &SessionContext,
        request: &ListRequest,
    ) -> Result<RecordPage<UserRecord>, SourceError> {
        let data = self.data.read().await;
        Ok(page(data.users.clone(), request))
    }

    async fn active_sessions(
        &self,
        _session: &SessionContext,
        _window_minutes: u32,
    ) -> Result<ActiveSessions, SourceError> {
        Ok(self.data.read().await.active_sessions.clone())
    }

    async fn list_activity_types(
        &self,
        _session: &SessionContext,
    ) -> Result<Vec<String>, SourceError> {
        let data = self.data.read().await;
        if !data.activity_types.is_empty() {
            return Ok(data.activity_types.clone());
        }
        let mut types: Vec<String> = data
            .activities
            .iter()
            .filter_map(|a| a.type_name.clone())
            .collect();
        types.sort();
        types.dedup();
        Ok(types)
    }

    async fn execute(&self, session: &SessionContext, command: Command) -> Result<(), SourceError> {
        let mut data = self.data.write().await;
        match command {
            Command::RegisterActivity { activity_id } => register(&mut data, session, &activity_id),
            Command::CancelRegistration { activity_id } => cancel(&mut data, session, &activity_id),
            Command::ApproveRegistration { registration_id } => review(
                &mut data,
                session,
                &registration_id,
                RegistrationStatus::Approved,
                None,
            ),
            Command::RejectRegistration {
                registration_id,
                reason,
            } => review(
                &mut data,
                session,
                &registration_id,
                RegistrationStatus::Rejected,
                Some(reason),
            ),
            Command::ApproveActivity { activity_id } => {
                review_activity(&mut data, &activity_id, ActivityStatus::Approved)
            }
            Command::RejectActivity { activity_id, .. } => {
                review_activity(&mut data, &activity_id, ActivityStatus::Rejected)
            }
            Command::BulkApprove { registration_ids } => {
                let mut approved = 0usize;
                for id in &registration_ids {
                    if review(&mut data, session, id, RegistrationStatus::Approved, None).is_ok() {
                        approved += 1;
                    }
                }
                if approved == 0 {
                    return Err(rejected("Không có đăng ký nào được duyệt."));
                }
                Ok(())
            }
            Command::CreateUser { user, role } => {
                let login = user.login_name.trim().to_string();
                let taken = data.users.iter().any(|u| {
                    u.login_name
                        .as_deref()
                        .is_some_and(|l| l.eq_ignore_ascii_case(&login))
                });
                if taken {
                    return Err(SourceError::Upstream {
                        status: 409,
                        message: "Mã số đã tồn tại.".to_string(),
                    });
                }
                let student = role.is_student_like().then(|| StudentProfile {
                    student_code: user.student_code.clone(),
                    class_id: user.class_id.clone(),
                    phone: user.phone.clone(),
                    gender: user.gender.clone(),
                    address: user.address.clone(),
                    birth_date: user
                        .birth_date
                        .as_deref()
                        .and_then(wire::parse_timestamp)
                        .map(|dt| dt.date_naive()),
                    class_name: None,
                });
                data.users.push(UserRecord {
                    id: Uuid::new_v4().to_string(),
                    display_name: Some(user.full_name.trim().to_string()),
                    login_name: Some(login.clone()),
                    email: Some(user.email.trim().to_string()),
                    role: Some(role),
                    locked: false,
                    active_now: false,
                    created_at: Some(Utc::now()),
                    last_login_at: None,
                    student,
                });
                data.credentials.push((login, user.password));
                Ok(())
            }
            Command::SetUserLocked { user_id, locked } => {
                let user = data
                    .users
                    .iter_mut()
                    .find(|u| u.id == user_id)
                    .ok_or_else(|| SourceError::NotFound(format!("user {user_id}")))?;
                user.locked = locked;
                Ok(())
            }
            Command::DeleteUser { user_id } => {
                let before = data.users.len();
                data.users.retain(|u| u.id != user_id);
                if data.users.len() == before {
                    return Err(SourceError::NotFound(format!("user {user_id}")));
                }
                Ok(())
            }
        }
    }
}
