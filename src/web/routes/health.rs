use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::config::DataSource;
use crate::web::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let source = match state.config.data_source {
        DataSource::Rest { .. } => "rest",
        DataSource::Snapshot { .. } => "snapshot",
    };
    Json(json!({
        "status": "ok",
        "source": source,
        "build": env!("PORTAL_BUILD_ID"),
    }))
}
