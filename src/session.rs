//! Who is asking, built once per request and passed down explicitly.

use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};

use crate::models::{RegistrationRecord, Role};
use crate::source::wire;
use crate::source::RegistrationScope;

/// Identity claims read from the access token payload. The signature is not
/// checked here; the REST API verifies the token on every call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenClaims {
    pub sub: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub class_id: Option<String>,
}

impl TokenClaims {
    pub fn decode(token: &str) -> Option<TokenClaims> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return None;
        }
        let payload_bytes = general_purpose::URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
        let payload: Value = serde_json::from_slice(&payload_bytes).ok()?;
        Some(TokenClaims {
            sub: wire::text(&payload, &["sub", "id", "userId", "user_id"])?,
            name: wire::text(&payload, &["name", "ho_ten"]),
            role: wire::text(&payload, &["role", "roleCode", "vai_tro"]),
            class_id: wire::text(&payload, &["class_id", "lop_id"]),
        })
    }

    /// Token with these claims and no signature, for offline sessions.
    pub fn encode_unsigned(&self) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload = json!({
            "sub": self.sub,
            "name": self.name,
            "role": self.role,
            "class_id": self.class_id,
        });
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{payload}.")
    }

    pub fn into_session(self, token: Option<String>, semester: Option<String>) -> SessionContext {
        SessionContext {
            user_id: self.sub,
            display_name: self.name,
            role: self.role.as_deref().and_then(Role::normalize),
            class_id: self.class_id,
            token,
            semester,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    pub user_id: String,
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub class_id: Option<String>,
    /// Bearer token forwarded to the REST API.
    pub token: Option<String>,
    pub semester: Option<String>,
}

impl SessionContext {
    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    pub fn can_manage_users(&self) -> bool {
        self.is_admin()
    }

    pub fn can_review_registrations(&self) -> bool {
        matches!(
            self.role,
            Some(Role::Admin | Role::Teacher | Role::ClassMonitor)
        )
    }

    /// Activity proposals are decided by teachers and admins only.
    pub fn can_review_activities(&self) -> bool {
        matches!(self.role, Some(Role::Admin | Role::Teacher))
    }

    pub fn can_register_for_activities(&self) -> bool {
        self.role.is_some_and(Role::is_student_like)
    }

    /// Registrations this user may list. Reviewers see their review queue,
    /// students their own sign-ups.
    pub fn registration_scope(&self) -> Option<RegistrationScope> {
        match self.role? {
            Role::Admin => Some(RegistrationScope::All),
            Role::Teacher => Some(RegistrationScope::Teacher),
            Role::ClassMonitor => self
                .class_id
                .clone()
                .filter(|class| !class.trim().is_empty())
                .map(RegistrationScope::Class),
            Role::Student => Some(RegistrationScope::Own),
        }
    }

    /// Whether this user may approve or reject `registration`. Class
    /// monitors are limited to students of their own class.
    pub fn can_review(&self, registration: &RegistrationRecord) -> bool {
        match self.role {
            Some(Role::Admin | Role::Teacher) => true,
            Some(Role::ClassMonitor) => match (&self.class_id, &registration.student.class_id) {
                (Some(mine), Some(theirs)) => mine.trim() == theirs.trim(),
                _ => false,
            },
            _ => false,
        }
    }

    pub fn role_label(&self) -> &'static str {
        self.role.map(Role::label).unwrap_or("Khách")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::registrations::tests::registration;

    fn session(role: Role, class: Option<&str>) -> SessionContext {
        SessionContext {
            user_id: "u1".to_string(),
            role: Some(role),
            class_id: class.map(str::to_string),
            ..SessionContext::default()
        }
    }

    #[test]
    fn monitors_review_only_their_class() {
        let monitor = session(Role::ClassMonitor, Some("CTK45A"));
        let mut own = registration("r1", "cho_duyet");
        own.student.class_id = Some("CTK45A".to_string());
        let mut other = registration("r2", "cho_duyet");
        other.student.class_id = Some("CTK45B".to_string());

        assert!(monitor.can_review(&own));
        assert!(!monitor.can_review(&other));
        assert!(session(Role::Teacher, None).can_review(&other));
        assert!(!session(Role::Student, None).can_review(&own));
    }

    #[test]
    fn scopes_follow_role() {
        assert_eq!(
            session(Role::Admin, None).registration_scope(),
            Some(RegistrationScope::All)
        );
        assert_eq!(
            session(Role::ClassMonitor, Some("K45")).registration_scope(),
            Some(RegistrationScope::Class("K45".to_string()))
        );
        assert_eq!(session(Role::ClassMonitor, None).registration_scope(), None);
        assert_eq!(
            session(Role::Student, None).registration_scope(),
            Some(RegistrationScope::Own)
        );
        assert_eq!(SessionContext::default().registration_scope(), None);
    }

    #[test]
    fn claims_survive_encoding() {
        let claims = TokenClaims {
            sub: "42".to_string(),
            name: Some("Phạm D".to_string()),
            role: Some("Giảng viên".to_string()),
            class_id: None,
        };
        let token = claims.encode_unsigned();
        let decoded = TokenClaims::decode(&token).unwrap();
        assert_eq!(decoded, claims);

        let session = decoded.into_session(Some(token), Some("HK1".to_string()));
        assert_eq!(session.role, Some(Role::Teacher));
        assert_eq!(session.user_id, "42");
    }

    #[test]
    fn garbage_tokens_decode_to_nothing() {
        assert!(TokenClaims::decode("").is_none());
        assert!(TokenClaims::decode("a.b").is_none());
        assert!(TokenClaims::decode("a.!!!.c").is_none());
        let no_sub = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"role":"ADMIN"}"#);
        assert!(TokenClaims::decode(&format!("x.{no_sub}.y")).is_none());
    }

    #[test]
    fn capabilities() {
        let admin = session(Role::Admin, None);
        assert!(admin.can_manage_users());
        assert!(!admin.can_register_for_activities());
        let monitor = session(Role::ClassMonitor, Some("K45"));
        assert!(monitor.can_register_for_activities());
        assert!(monitor.can_review_registrations());
        assert!(!monitor.can_manage_users());
        assert!(!monitor.can_review_activities());
        assert!(admin.can_review_activities());
        assert!(session(Role::Teacher, None).can_review_activities());
        assert_eq!(SessionContext::default().role_label(), "Khách");
    }
}
