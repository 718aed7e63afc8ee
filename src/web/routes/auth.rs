use askama::Template;
use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use cookie::{time::Duration, Cookie, SameSite};
use serde::Deserialize;
use tracing::{info, warn};

use crate::source::SourceError;
use crate::web::middleware::auth::ACCESS_TOKEN_COOKIE;
use crate::web::page::render;
use crate::web::AppState;

#[derive(Template, Default)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub login_name: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    maso: String,
    #[serde(default)]
    password: String,
}

pub async fn login_page() -> Response {
    render(&LoginTemplate::default())
}

fn token_cookie(value: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(ACCESS_TOKEN_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

fn with_cookie(mut response: Response, cookie: Cookie<'_>) -> Response {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
            response
        }
        Err(e) => {
            warn!(error = %e, "cookie is not a valid header value");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn login_handler(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let login_name = form.maso.trim().to_string();
    if login_name.is_empty() || form.password.is_empty() {
        let mut response = render(&LoginTemplate {
            login_name,
            error: Some("Vui lòng nhập mã số và mật khẩu.".to_string()),
        });
        *response.status_mut() = StatusCode::BAD_REQUEST;
        return response;
    }

    match state.source.login(&login_name, &form.password).await {
        Ok(outcome) => {
            info!(
                login = %login_name,
                role = outcome.role.map(|r| r.code()).unwrap_or("unknown"),
                "login succeeded"
            );
            with_cookie(
                Redirect::to("/activities").into_response(),
                token_cookie(outcome.token),
            )
        }
        Err(e) => {
            warn!(login = %login_name, error = %e, "login failed");
            let mut response = render(&LoginTemplate {
                login_name,
                error: Some(login_error_message(&e)),
            });
            *response.status_mut() = StatusCode::UNAUTHORIZED;
            response
        }
    }
}

/// Rejected credentials carry the API's own wording when it sends one.
fn login_error_message(err: &SourceError) -> String {
    match err {
        SourceError::Forbidden(message) if !message.trim().is_empty() => message.clone(),
        SourceError::Forbidden(_) => "Sai mã số hoặc mật khẩu.".to_string(),
        other => other.user_message(),
    }
}

pub async fn logout_handler() -> Response {
    let mut cookie = token_cookie(String::new());
    cookie.set_max_age(Duration::ZERO);
    with_cookie(Redirect::to("/login").into_response(), cookie)
}
