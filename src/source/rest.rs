use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::models::{ActivityRecord, RegistrationRecord, Role, UserRecord};
use crate::session::SessionContext;

use super::envelope::{map_page, RecordPage};
use super::wire;
use super::{
    ActiveSessions, Command, ListRequest, ListSource, LoginOutcome, RegistrationScope,
    SourceError,
};

/// Client for the portal REST API.
#[derive(Clone)]
pub struct RestSource {
    client: reqwest::Client,
    base: Url,
}

impl RestSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let base_url = base_url.into();
        let base = Url::parse(base_url.trim()).map_err(|e| connect_failed(&base_url, e))?;
        if base.cannot_be_a_base() {
            return Err(connect_failed(&base_url, "not a hierarchical url"));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| connect_failed(&base_url, e))?;
        Ok(RestSource { client, base })
    }

    /// Appends `segments` to the base path. Each one is percent-encoded as a
    /// single segment, so an id can never climb into another endpoint.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SourceError> {
        if let Some(bad) = segments.iter().find(|s| matches!(**s, "" | "." | "..")) {
            return Err(SourceError::NotFound(format!("invalid path segment {bad:?}")));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| connect_failed(self.base.as_str(), "not a hierarchical url"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        path: &[&str],
        session: Option<&SessionContext>,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value, SourceError> {
        let url = self.endpoint(path)?;
        let mut request = self.client.request(method.clone(), url.clone()).query(query);
        if let Some(token) = session.and_then(|s| s.token.as_deref()) {
            request = request.headers(bearer_headers(token)?);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        debug!(%method, url = %url, "calling portal api");
        let resp = request
            .send()
            .await
            .map_err(|e| connect_failed(url.as_str(), e))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| connect_failed(url.as_str(), e))?;
        let body: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                if status.is_success() {
                    SourceError::Decode(format!("{url}: {e}"))
                } else {
                    upstream_error(status, &Value::String(text.clone()))
                }
            })?
        };

        if !status.is_success() {
            let err = upstream_error(status, &body);
            warn!(url = %url, status = status.as_u16(), error = %err, "portal api request failed");
            return Err(err);
        }
        Ok(body)
    }

    async fn get(
        &self,
        path: &[&str],
        session: &SessionContext,
        query: &[(&str, String)],
    ) -> Result<Value, SourceError> {
        self.send(Method::GET, path, Some(session), query, None).await
    }

    async fn command(
        &self,
        method: Method,
        path: &[&str],
        session: &SessionContext,
        body: Option<Value>,
    ) -> Result<(), SourceError> {
        self.send(method, path, Some(session), &[], body).await.map(|_| ())
    }

    async fn review(
        &self,
        session: &SessionContext,
        registration_id: &str,
        action: &str,
        body: Option<Value>,
    ) -> Result<(), SourceError> {
        match session.role {
            Some(Role::ClassMonitor) => {
                let path = ["core", "monitor", "registrations", registration_id, action];
                self.command(Method::PUT, &path, session, body).await
            }
            Some(Role::Teacher) => {
                let path = ["core", "teacher", "registrations", registration_id, action];
                self.command(Method::POST, &path, session, body).await
            }
            _ => {
                let path = ["core", "admin", "registrations", registration_id, action];
                self.command(Method::POST, &path, session, body).await
            }
        }
    }

    async fn review_activity(
        &self,
        session: &SessionContext,
        activity_id: &str,
        action: &str,
        body: Option<Value>,
    ) -> Result<(), SourceError> {
        let scope = match session.role {
            Some(Role::Teacher) => "teachers",
            _ => "admin",
        };
        let path = ["core", scope, "activities", activity_id, action];
        self.command(Method::POST, &path, session, body).await
    }

    async fn bulk_approve(&self, session: &SessionContext, ids: &[String]) -> Result<(), SourceError> {
        match session.role {
            Some(Role::Teacher) => {
                let body = json!({ "ids": ids });
                let path = ["core", "teacher", "registrations", "bulk-approve"];
                self.command(Method::POST, &path, session, Some(body)).await
            }
            Some(Role::ClassMonitor) => {
                // No bulk endpoint for monitors; approve one by one and
                // report the first failure after trying all.
                let mut first_error = None;
                for id in ids {
                    if let Err(err) = self.review(session, id, "approve", None).await {
                        warn!(registration_id = %id, error = %err, "bulk approve item failed");
                        first_error.get_or_insert(err);
                    }
                }
                first_error.map_or(Ok(()), Err)
            }
            _ => {
                let body = json!({ "ids": ids, "action": "approve" });
                let path = ["core", "admin", "registrations", "bulk"];
                self.command(Method::POST, &path, session, Some(body)).await
            }
        }
    }
}

fn bearer_headers(token: &str) -> Result<HeaderMap, SourceError> {
    let mut headers = HeaderMap::new();
    let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|_| SourceError::Forbidden("invalid access token".to_string()))?;
    headers.insert(AUTHORIZATION, auth_value);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

fn connect_failed(url: &str, err: impl ToString) -> SourceError {
    SourceError::Connect {
        url: url.to_string(),
        message: err.to_string(),
    }
}

/// Maps an error response. The API puts its message under `message`,
/// `error` or `msg`.
fn upstream_error(status: StatusCode, body: &Value) -> SourceError {
    let message = wire::text(body, &["message", "error", "msg"]).unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::Forbidden(message),
        StatusCode::NOT_FOUND => SourceError::NotFound(message),
        _ => SourceError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

fn list_query(request: &ListRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("page", request.page.max(1).to_string()),
        ("limit", request.limit.max(1).to_string()),
    ];
    if let Some(semester) = request.semester.as_deref().filter(|s| !s.trim().is_empty()) {
        query.push(("semester", semester.to_string()));
    }
    query
}

fn decode_page<R>(
    body: &Value,
    keys: &[&str],
    kind: &str,
    map: impl Fn(&Value) -> Option<R>,
) -> Result<RecordPage<R>, SourceError> {
    map_page(body, keys, kind, map)
        .ok_or_else(|| SourceError::Decode(format!("unexpected {kind} list shape")))
}

#[async_trait]
impl ListSource for RestSource {
    async fn login(&self, login_name: &str, password: &str) -> Result<LoginOutcome, SourceError> {
        let body = json!({ "maso": login_name, "password": password });
        let resp = self
            .send(Method::POST, &["core", "auth", "login"], None, &[], Some(body))
            .await?;
        let data = resp.get("data").unwrap_or(&resp);
        let token = wire::text(data, &["token", "access_token"])
            .ok_or_else(|| SourceError::Decode("login response without token".to_string()))?;
        let user = data.get("user").unwrap_or(&Value::Null);
        Ok(LoginOutcome {
            token,
            display_name: wire::text(user, &["ho_ten", "name"]),
            role: wire::text(user, &["role", "roleCode", "vai_tro.ten_vt"])
                .and_then(|raw| Role::normalize(&raw)),
        })
    }

    async fn list_activities(
        &self,
        session: &SessionContext,
        request: &ListRequest,
    ) -> Result<RecordPage<ActivityRecord>, SourceError> {
        let body = self
            .get(&["core", "activities"], session, &list_query(request))
            .await?;
        decode_page(&body, &["activities"], "activity", wire::activity_from_value)
    }

    async fn list_registrations(
        &self,
        session: &SessionContext,
        scope: &RegistrationScope,
        request: &ListRequest,
    ) -> Result<RecordPage<RegistrationRecord>, SourceError> {
        let mut query = list_query(request);
        let path = match scope {
            RegistrationScope::All => ["core", "admin", "registrations"],
            RegistrationScope::Teacher => ["core", "teacher", "registrations"],
            RegistrationScope::Class(class_id) => {
                query.push(("lop_id", class_id.clone()));
                ["core", "monitor", "registrations"]
            }
            RegistrationScope::Own => ["core", "registrations", "my"],
        };
        let body = self.get(&path, session, &query).await?;
        decode_page(
            &body,
            &["registrations"],
            "registration",
            wire::registration_from_value,
        )
    }

    async fn list_users(
        &self,
        session: &SessionContext,
        request: &ListRequest,
    ) -> Result<RecordPage<UserRecord>, SourceError> {
        let body = self
            .get(&["core", "admin", "users"], session, &list_query(request))
            .await?;
        decode_page(&body, &["users"], "user", wire::user_from_value)
    }

    async fn active_sessions(
        &self,
        session: &SessionContext,
        window_minutes: u32,
    ) -> Result<ActiveSessions, SourceError> {
        let query = [("minutes", window_minutes.to_string())];
        let body = self
            .get(&["core", "sessions", "active-users"], session, &query)
            .await?;
        Ok(wire::active_sessions_from_value(&body))
    }

    async fn list_activity_types(
        &self,
        session: &SessionContext,
    ) -> Result<Vec<String>, SourceError> {
        let path = ["core", "activities", "types", "list"];
        let body = self.get(&path, session, &[]).await?;
        Ok(wire::activity_types_from_value(&body))
    }

    async fn execute(&self, session: &SessionContext, command: Command) -> Result<(), SourceError> {
        debug!(command = command.name(), user_id = %session.user_id, "executing command");
        match command {
            Command::RegisterActivity { activity_id } => {
                let path = ["core", "activities", activity_id.as_str(), "register"];
                self.command(Method::POST, &path, session, None).await
            }
            Command::CancelRegistration { activity_id } => {
                let path = ["core", "activities", activity_id.as_str(), "cancel"];
                self.command(Method::POST, &path, session, None).await
            }
            Command::ApproveActivity { activity_id } => {
                self.review_activity(session, &activity_id, "approve", None)
                    .await
            }
            Command::RejectActivity {
                activity_id,
                reason,
            } => {
                let body = json!({ "reason": reason.trim() });
                self.review_activity(session, &activity_id, "reject", Some(body))
                    .await
            }
            Command::ApproveRegistration { registration_id } => {
                self.review(session, &registration_id, "approve", None).await
            }
            Command::RejectRegistration {
                registration_id,
                reason,
            } => {
                let body = json!({ "reason": reason.trim() });
                self.review(session, &registration_id, "reject", Some(body))
                    .await
            }
            Command::BulkApprove { registration_ids } => {
                self.bulk_approve(session, &registration_ids).await
            }
            Command::CreateUser { user, role } => {
                let body = wire::new_user_body(&user, role);
                self.command(Method::POST, &["core", "admin", "users"], session, Some(body))
                    .await
            }
            Command::SetUserLocked { user_id, locked } => {
                let action = if locked { "lock" } else { "unlock" };
                let path = ["core", "admin", "users", user_id.as_str(), action];
                self.command(Method::PATCH, &path, session, None).await
            }
            Command::DeleteUser { user_id } => {
                let path = ["core", "admin", "users", user_id.as_str()];
                self.command(Method::DELETE, &path, session, None).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_mapping() {
        let body = json!({ "success": false, "message": "Hoạt động đã đầy" });
        match upstream_error(StatusCode::BAD_REQUEST, &body) {
            SourceError::Upstream { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Hoạt động đã đầy");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            upstream_error(StatusCode::FORBIDDEN, &Value::Null),
            SourceError::Forbidden(_)
        ));
        assert!(matches!(
            upstream_error(StatusCode::NOT_FOUND, &json!({ "error": "x" })),
            SourceError::NotFound(_)
        ));
    }

    #[test]
    fn ids_stay_inside_their_path_segment() {
        let source = RestSource::new("http://portal.test/api/").unwrap();

        let url = source
            .endpoint(&["core", "activities", "../../admin/registrations/bulk", "register"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://portal.test/api/core/activities/..%2F..%2Fadmin%2Fregistrations%2Fbulk/register"
        );

        let plain = source.endpoint(&["core", "admin", "users", "u-7", "lock"]).unwrap();
        assert_eq!(plain.as_str(), "http://portal.test/api/core/admin/users/u-7/lock");

        for id in ["..", ".", ""] {
            assert!(
                source.endpoint(&["core", "activities", id, "register"]).is_err(),
                "{id:?}"
            );
        }
    }

    #[test]
    fn base_url_must_be_hierarchical() {
        assert!(RestSource::new("mailto:portal@example.com").is_err());
        assert!(RestSource::new("not a url").is_err());
    }

    #[test]
    fn list_query_includes_semester_when_set() {
        let request = ListRequest {
            semester: Some("HK1-2025".to_string()),
            ..ListRequest::default()
        };
        let query = list_query(&request);
        assert!(query.contains(&("semester", "HK1-2025".to_string())));
        assert!(query.contains(&("limit", super::super::FETCH_LIMIT.to_string())));
    }
}
