use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::session::SessionContext;

/// Header navigation, shown according to what the session may do.
#[derive(Debug, Clone, Default)]
pub struct NavView {
    pub display_name: String,
    pub role_label: String,
    pub show_registrations: bool,
    pub review_label: &'static str,
    pub show_users: bool,
    pub show_points: bool,
}

impl NavView {
    pub fn from_session(session: &SessionContext) -> Self {
        NavView {
            display_name: session
                .display_name
                .clone()
                .unwrap_or_else(|| session.user_id.clone()),
            role_label: session.role_label().to_string(),
            show_registrations: session.registration_scope().is_some(),
            review_label: if session.can_review_registrations() {
                "Duyệt đăng ký"
            } else {
                "Đăng ký của tôi"
            },
            show_users: session.can_manage_users(),
            show_points: session.can_register_for_activities(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub message: String,
}

pub fn render<T: Template>(template: &T) -> Response {
    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Không thể hiển thị trang.").into_response()
        }
    }
}

pub fn error_page(status: StatusCode, message: impl Into<String>) -> Response {
    let mut response = render(&ErrorTemplate {
        message: message.into(),
    });
    *response.status_mut() = status;
    response
}
