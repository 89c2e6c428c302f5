//! エラーログAPI

use super::error::AppError;
use crate::common::error::{CommonError, MonitorError};
use crate::types::{ErrorRecord, ErrorStats, NewErrorRecord, Timeframe};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

/// エラー統計のクエリ
#[derive(Debug, Default, Deserialize)]
pub struct ErrorStatsParams {
    /// 集計ウィンドウ（例: "24h"）
    pub timeframe: Option<String>,
    /// recent_errors の件数
    pub limit: Option<u32>,
}

/// GET /api/errors/stats
pub async fn get_error_stats(
    State(state): State<AppState>,
    Query(params): Query<ErrorStatsParams>,
) -> Result<Json<ErrorStats>, AppError> {
    let timeframe = match params.timeframe.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => raw.parse::<Timeframe>()?,
        _ => Timeframe::default(),
    };
    let stats = state
        .monitor
        .aggregator
        .get_error_stats(timeframe, params.limit)
        .await?;
    Ok(Json(stats))
}

/// GET /api/errors/{id}
pub async fn get_error(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ErrorRecord>, AppError> {
    // 形式不正なIDは存在しないIDと同じ扱い
    let uuid =
        Uuid::parse_str(&id).map_err(|_| MonitorError::NotFound(format!("error log {id}")))?;
    let record = state.monitor.aggregator.get_error(uuid).await?;
    Ok(Json(record))
}

/// POST /api/errors
///
/// 他のサブシステムからのエラー報告を受け付ける。
pub async fn report_error(
    State(state): State<AppState>,
    Json(payload): Json<NewErrorRecord>,
) -> Result<(StatusCode, Json<ErrorRecord>), AppError> {
    for (field, value) in [
        ("code", &payload.code),
        ("message", &payload.message),
        ("endpoint", &payload.endpoint),
    ] {
        if value.trim().is_empty() {
            return Err(MonitorError::from(CommonError::Validation(format!(
                "{field} must not be empty"
            )))
            .into());
        }
    }
    if !(100..=599).contains(&payload.status) {
        return Err(MonitorError::from(CommonError::Validation(format!(
            "status {} is not an HTTP status code",
            payload.status
        )))
        .into());
    }

    let record = state.monitor.recorder.record_error(payload).await;
    Ok((StatusCode::CREATED, Json(record)))
}
