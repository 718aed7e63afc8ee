use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Redirect, Response},
    Extension, Form,
};

use crate::models::NewUser;
use crate::pipeline::ListParams;
use crate::services::refresh::{refresh, NoticeParams, NoticeView};
use crate::services::users_service::{self, UsersPageData};
use crate::session::SessionContext;
use crate::web::page::{error_page, render, NavView};
use crate::web::routes::activities::ReturnForm;
use crate::web::AppState;

const LIST_PATH: &str = "/users";

#[derive(Template)]
#[template(path = "users.html")]
pub struct UsersTemplate {
    pub nav: NavView,
    pub notice: Option<NoticeView>,
    pub data: UsersPageData,
}

pub async fn users_handler(
    Extension(session): Extension<SessionContext>,
    Query(params): Query<ListParams>,
    Query(notice): Query<NoticeParams>,
    State(state): State<AppState>,
) -> Response {
    if !session.can_manage_users() {
        return error_page(
            StatusCode::FORBIDDEN,
            "Chỉ quản trị viên mới được quản lý tài khoản.",
        );
    }

    let data = users_service::build_users_page(
        state.source.as_ref(),
        &session,
        &params,
        state.config.page_size,
        state.config.active_window_minutes,
    )
    .await;

    render(&UsersTemplate {
        nav: NavView::from_session(&session),
        notice: notice.view(),
        data,
    })
}

pub async fn create_user_handler(
    Extension(session): Extension<SessionContext>,
    State(state): State<AppState>,
    Form(user): Form<NewUser>,
) -> Redirect {
    let outcome = users_service::create_user(state.source.as_ref(), &session, user).await;
    refresh(LIST_PATH, None, outcome)
}

pub async fn lock_handler(
    Extension(session): Extension<SessionContext>,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<ReturnForm>,
) -> Redirect {
    let outcome = users_service::set_locked(state.source.as_ref(), &session, &user_id, true).await;
    refresh(LIST_PATH, form.return_to.as_deref(), outcome)
}

pub async fn unlock_handler(
    Extension(session): Extension<SessionContext>,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<ReturnForm>,
) -> Redirect {
    let outcome =
        users_service::set_locked(state.source.as_ref(), &session, &user_id, false).await;
    refresh(LIST_PATH, form.return_to.as_deref(), outcome)
}

pub async fn delete_handler(
    Extension(session): Extension<SessionContext>,
    Path(user_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<ReturnForm>,
) -> Redirect {
    let outcome = users_service::delete_user(state.source.as_ref(), &session, &user_id).await;
    refresh(LIST_PATH, form.return_to.as_deref(), outcome)
}
