use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use crate::routes::AppState;

pub async fn health_check() -> impl IntoResponse {
    axum::Json(json!({
        "status": "healthy",
        "app": "shopd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus指标导出
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder 未启用").into_response(),
    }
}
