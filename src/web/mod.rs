pub mod middleware;
pub mod page;
pub mod routes;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    response::Redirect,
    routing::{get, get_service, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use http::StatusCode;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::AppConfig;
use crate::source::ListSource;
use middleware::auth::require_session;
use page::error_page;
use routes::{activities, auth, health, points, registrations, users};

/// Shared by every handler. The source is the only path to portal data.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub source: Arc<dyn ListSource>,
}

impl AppState {
    pub fn new(config: AppConfig, source: Arc<dyn ListSource>) -> Self {
        AppState {
            config: Arc::new(config),
            source,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/activities", get(activities::activities_handler))
        .route(
            "/activities/:activity_id/register",
            post(activities::register_handler),
        )
        .route(
            "/activities/:activity_id/cancel",
            post(activities::cancel_handler),
        )
        .route(
            "/activities/:activity_id/approve",
            post(activities::approve_handler),
        )
        .route(
            "/activities/:activity_id/reject",
            post(activities::reject_handler),
        )
        .route("/registrations", get(registrations::registrations_handler))
        .route(
            "/registrations/bulk-approve",
            post(registrations::bulk_approve_handler),
        )
        .route(
            "/registrations/:registration_id/approve",
            post(registrations::approve_handler),
        )
        .route(
            "/registrations/:registration_id/reject",
            post(registrations::reject_handler),
        )
        .route(
            "/users",
            get(users::users_handler).post(users::create_user_handler),
        )
        .route("/users/:user_id/lock", post(users::lock_handler))
        .route("/users/:user_id/unlock", post(users::unlock_handler))
        .route("/users/:user_id/delete", post(users::delete_handler))
        .route("/points", get(points::points_handler))
        .route("/logout", post(auth::logout_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let no_store = || {
        SetResponseHeaderLayer::if_not_present(CACHE_CONTROL, HeaderValue::from_static("no-store"))
    };

    Router::new()
        .route("/", get(|| async { Redirect::to("/activities") }))
        .route("/login", get(auth::login_page).post(auth::login_handler))
        .route("/health", get(health::health_handler))
        .merge(protected_routes)
        .fallback(|| async { error_page(StatusCode::NOT_FOUND, "Không tìm thấy trang.") })
        .nest_service(
            "/assets",
            get_service(ServeDir::new(&state.config.static_dir)).layer(no_store()),
        )
        .layer(no_store())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
