use askama::Template;
use axum::{extract::State, response::Response, Extension};

use crate::services::points_service::{self, PointsPageData};
use crate::services::refresh::NoticeView;
use crate::session::SessionContext;
use crate::web::page::{render, NavView};
use crate::web::AppState;

#[derive(Template)]
#[template(path = "points.html")]
pub struct PointsTemplate {
    pub nav: NavView,
    pub notice: Option<NoticeView>,
    pub data: PointsPageData,
}

pub async fn points_handler(
    Extension(session): Extension<SessionContext>,
    State(state): State<AppState>,
) -> Response {
    let data = points_service::build_points_page(state.source.as_ref(), &session).await;
    render(&PointsTemplate {
        nav: NavView::from_session(&session),
        notice: None,
        data,
    })
}
