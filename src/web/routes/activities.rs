use askama::Template;
use axum::{
    extract::{Path, Query, State},
    response::{Redirect, Response},
    Extension, Form,
};
use chrono::Utc;
use serde::Deserialize;

use crate::pipeline::ListParams;
use crate::services::activities_service::{self, ActivitiesPageData};
use crate::services::refresh::{refresh, NoticeParams, NoticeView};
use crate::session::SessionContext;
use crate::web::page::{render, NavView};
use crate::web::AppState;

#[derive(Template)]
#[template(path = "activities.html")]
pub struct ActivitiesTemplate {
    pub nav: NavView,
    pub notice: Option<NoticeView>,
    pub data: ActivitiesPageData,
}

pub async fn activities_handler(
    Extension(session): Extension<SessionContext>,
    Query(params): Query<ListParams>,
    Query(notice): Query<NoticeParams>,
    State(state): State<AppState>,
) -> Response {
    let data = activities_service::build_activities_page(
        state.source.as_ref(),
        &session,
        &params,
        state.config.page_size,
        Utc::now(),
    )
    .await;

    render(&ActivitiesTemplate {
        nav: NavView::from_session(&session),
        notice: notice.view(),
        data,
    })
}

#[derive(Debug, Deserialize, Default)]
pub struct ReturnForm {
    pub return_to: Option<String>,
}

pub async fn register_handler(
    Extension(session): Extension<SessionContext>,
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<ReturnForm>,
) -> Redirect {
    let outcome =
        activities_service::register(state.source.as_ref(), &session, &activity_id).await;
    refresh("/activities", form.return_to.as_deref(), outcome)
}

pub async fn cancel_handler(
    Extension(session): Extension<SessionContext>,
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<ReturnForm>,
) -> Redirect {
    let outcome =
        activities_service::cancel_registration(state.source.as_ref(), &session, &activity_id)
            .await;
    refresh("/activities", form.return_to.as_deref(), outcome)
}

#[derive(Debug, Deserialize, Default)]
pub struct RejectActivityForm {
    #[serde(default)]
    pub reason: String,
    pub return_to: Option<String>,
}

pub async fn approve_handler(
    Extension(session): Extension<SessionContext>,
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<ReturnForm>,
) -> Redirect {
    let outcome =
        activities_service::approve_activity(state.source.as_ref(), &session, &activity_id).await;
    refresh("/activities", form.return_to.as_deref(), outcome)
}

pub async fn reject_handler(
    Extension(session): Extension<SessionContext>,
    Path(activity_id): Path<String>,
    State(state): State<AppState>,
    Form(form): Form<RejectActivityForm>,
) -> Redirect {
    let outcome = activities_service::reject_activity(
        state.source.as_ref(),
        &session,
        &activity_id,
        &form.reason,
    )
    .await;
    refresh("/activities", form.return_to.as_deref(), outcome)
}
