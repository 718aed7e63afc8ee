use askama::Template;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::{Redirect, Response},
    Extension, Form,
};
use serde::Deserialize;

use crate::pipeline::ListParams;
use crate::services::refresh::{refresh, NoticeParams, NoticeView};
use crate::services::registrations_service::{self, RegistrationsPageData};
use crate::session::SessionContext;
use crate::web::page::{render, NavView};
use crate::web::routes::activities::ReturnForm;
use crate::web::AppState;

const LIST_PATH: &str = "/registrations";

#[derive(Template)]
#[template(path = "registrations.html")]
pub struct RegistrationsTemplate {
    pub nav: NavView,
    pub notice: Option<NoticeView>,
    pub data: RegistrationsPageData,
}

pub async fn registrations_handler(
    Extension(session): Extension<SessionContext>,
    Query(params): Query<ListParams>,
    Query(notice): Query<NoticeParams>,
    State(state): State<AppState>,
) -> Response {
    let data = registrations_service::build_registrations_page(
        state.source.as_ref(),
        &session,
        &params,
        state.config.page_size,
    )
    .await;

    render(&RegistrationsTemplate {
        nav: NavView::from_session(&session),
        notice: notice.view(),
        data,
    })
}

pub async fn approve_handler(
    Extension(session): Extension<SessionContext>,
    Path(registration_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<ReturnForm>,
) -> Redirect {
    let outcome =
        registrations_service::approve(state.source.as_ref(), &session, &registration_id).await;
    refresh(LIST_PATH, form.return_to.as_deref(), outcome)
}

#[derive(Debug, Deserialize)]
pub struct RejectForm {
    #[serde(default)]
    pub reason: String,
    pub return_to: Option<String>,
}

pub async fn reject_handler(
    Extension(session): Extension<SessionContext>,
    Path(registration_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<RejectForm>,
) -> Redirect {
    let outcome = registrations_service::reject(
        state.source.as_ref(),
        &session,
        &registration_id,
        &form.reason,
    )
    .await;
    refresh(LIST_PATH, form.return_to.as_deref(), outcome)
}

/// Checkbox selections arrive as repeated `ids` fields, which `Form` cannot
/// collect, so the body is parsed directly.
pub async fn bulk_approve_handler(
    Extension(session): Extension<SessionContext>,
    State(state): State<AppState>,
    body: Bytes,
) -> Redirect {
    let mut ids = Vec::new();
    let mut return_to = None;
    for (key, value) in url::form_urlencoded::parse(&body) {
        match key.as_ref() {
            "ids" | "ids[]" => ids.push(value.into_owned()),
            "return_to" => return_to = Some(value.into_owned()),
            _ => {}
        }
    }

    let outcome =
        registrations_service::bulk_approve(state.source.as_ref(), &session, &ids).await;
    refresh(LIST_PATH, return_to.as_deref(), outcome)
}
