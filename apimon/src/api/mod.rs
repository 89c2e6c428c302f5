//! REST APIハンドラー
//!
//! ヘルス情報・エラー統計の読み取りAPIと、運用者向けの保守API

pub mod error;
pub mod errors;
pub mod health;
pub mod middleware;
pub mod settings;

use crate::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// APIルーターを作成
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/health/summary", get(health::get_summary))
        .route("/api/health/history", get(health::get_history))
        .route(
            "/api/health/checks",
            get(health::list_checks).delete(health::delete_all_checks),
        )
        .route("/api/health/checks/run", post(health::run_checks))
        .route("/api/health/checks/{id}", delete(health::delete_check))
        .route("/api/health/status", get(health::get_status))
        .route("/api/health/tasks/{name}/run", post(health::run_task))
        .route("/api/errors", post(errors::report_error))
        .route("/api/errors/stats", get(errors::get_error_stats))
        .route("/api/errors/{id}", get(errors::get_error))
        .route(
            "/api/settings/retention",
            get(settings::get_retention).put(settings::update_retention),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::error_capture_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
