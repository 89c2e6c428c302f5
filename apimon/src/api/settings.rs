//! 設定API（保持日数の上書き）

use super::error::AppError;
use crate::health::retention::RetentionPolicy;
use crate::AppState;
use axum::{extract::State, Json};

/// GET /api/settings/retention
pub async fn get_retention(
    State(state): State<AppState>,
) -> Result<Json<RetentionPolicy>, AppError> {
    Ok(Json(state.monitor.retention.effective_policy().await?))
}

/// PUT /api/settings/retention
pub async fn update_retention(
    State(state): State<AppState>,
    Json(policy): Json<RetentionPolicy>,
) -> Result<Json<RetentionPolicy>, AppError> {
    Ok(Json(state.monitor.retention.update_policy(policy).await?))
}
