use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::Cookie;
use tracing::debug;

use crate::config::AppConfig;
use crate::session::{SessionContext, TokenClaims};
use crate::web::AppState;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Access token from the request cookies, if any.
pub fn access_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == ACCESS_TOKEN_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

/// Session for a request: token claims first, then the configured dev user.
pub fn resolve_session(token: Option<String>, config: &AppConfig) -> Option<SessionContext> {
    let semester = config.current_semester.clone();
    if let Some(token) = token {
        if let Some(claims) = TokenClaims::decode(&token) {
            return Some(claims.into_session(Some(token), semester));
        }
        debug!("access token did not decode");
    }

    config.dev_user.as_ref().map(|dev| SessionContext {
        user_id: dev.user_id.clone(),
        display_name: None,
        role: dev.role,
        class_id: dev.class_id.clone(),
        token: None,
        semester,
    })
}

pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = access_token(&request);
    match resolve_session(token, &state.config) {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => Redirect::to("/login").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DevUser;
    use crate::models::Role;
    use axum::body::Body;

    fn config(dev_user: Option<DevUser>) -> AppConfig {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.current_semester = Some("HK1-2025".to_string());
        config.dev_user = dev_user;
        config
    }

    #[test]
    fn cookie_token_becomes_the_session() {
        let token = TokenClaims {
            sub: "u7".to_string(),
            role: Some("SINH_VIEN".to_string()),
            ..TokenClaims::default()
        }
        .encode_unsigned();
        let request = Request::builder()
            .header(header::COOKIE, format!("theme=dark; access_token={token}"))
            .body(Body::empty())
            .unwrap();

        let found = access_token(&request);
        assert_eq!(found.as_deref(), Some(token.as_str()));
        let session = resolve_session(found, &config(None)).unwrap();
        assert_eq!(session.user_id, "u7");
        assert_eq!(session.role, Some(Role::Student));
        assert_eq!(session.semester.as_deref(), Some("HK1-2025"));
    }

    #[test]
    fn dev_user_covers_missing_or_bad_tokens() {
        let dev = DevUser {
            user_id: "dev".to_string(),
            role: Some(Role::Admin),
            class_id: None,
        };
        let session = resolve_session(Some("garbage".to_string()), &config(Some(dev))).unwrap();
        assert_eq!(session.user_id, "dev");
        assert!(session.token.is_none());
        assert!(resolve_session(None, &config(None)).is_none());
    }
}
