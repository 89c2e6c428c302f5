//! ヘルスAPI
//!
//! サマリー・履歴・生データ・手動プローブ・スケジューラー状態

use super::error::AppError;
use crate::common::error::MonitorError;
use crate::health::aggregator::{CheckPage, HistoryQuery};
use crate::health::probe::CycleOutcome;
use crate::health::scheduler::{TaskStatus, TriggerOutcome};
use crate::types::{BatchSummary, CheckResult, HealthSummary, Timeframe};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

fn parse_timeframe(raw: Option<&str>) -> Result<Timeframe, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(Timeframe::default()),
    }
}

/// サマリーのクエリ
#[derive(Debug, Default, Deserialize)]
pub struct SummaryParams {
    /// 集計ウィンドウ（例: "24h"）
    pub timeframe: Option<String>,
}

/// GET /api/health/summary
pub async fn get_summary(
    State(state): State<AppState>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<HealthSummary>, AppError> {
    let timeframe = parse_timeframe(params.timeframe.as_deref())?;
    let summary = state.monitor.aggregator.get_health_summary(timeframe).await?;
    Ok(Json(summary))
}

/// 履歴のクエリ
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// 集計ウィンドウ
    pub timeframe: Option<String>,
    /// カテゴリ
    pub category: Option<String>,
    /// エンドポイント
    pub endpoint: Option<String>,
    /// 件数上限
    pub limit: Option<u32>,
}

/// GET /api/health/history
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<CheckResult>>, AppError> {
    let query = HistoryQuery {
        timeframe: parse_timeframe(params.timeframe.as_deref())?,
        category: params.category,
        endpoint: params.endpoint,
        limit: params.limit,
    };
    let rows = state.monitor.aggregator.get_health_history(&query).await?;
    Ok(Json(rows))
}

/// ページングのクエリ
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    /// 件数上限
    pub limit: Option<u32>,
    /// オフセット
    pub offset: Option<u32>,
}

/// GET /api/health/checks
pub async fn list_checks(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<CheckPage>, AppError> {
    let page = state
        .monitor
        .aggregator
        .list_checks(params.limit, params.offset)
        .await?;
    Ok(Json(page))
}

/// DELETE /api/health/checks
pub async fn delete_all_checks(State(state): State<AppState>) -> Result<Response, AppError> {
    let deleted = state.health_checks.delete_all().await?;
    info!(deleted, "Health check results deleted by operator");
    Ok(Json(json!({ "deleted": deleted })).into_response())
}

/// DELETE /api/health/checks/{id}
pub async fn delete_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let not_found = || MonitorError::NotFound(format!("health check {id}"));
    let uuid = Uuid::parse_str(&id).map_err(|_| not_found())?;
    if state.health_checks.delete(uuid).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found().into())
    }
}

/// POST /api/health/checks/run
///
/// アイドルならサイクルを実行して200でサマリーを返す。
/// 実行中なら何もせず202を返す。
pub async fn run_checks(State(state): State<AppState>) -> Result<Response, AppError> {
    // クライアントが切断してもサイクルは最後まで走らせる
    let cycle = state.monitor.probe_cycle.clone();
    let outcome = tokio::spawn(async move { cycle.run_if_idle().await })
        .await
        .map_err(|e| MonitorError::Internal(format!("probe cycle aborted: {e}")))?;

    match outcome {
        CycleOutcome::Completed(summary) => Ok(Json(summary).into_response()),
        CycleOutcome::AlreadyRunning => Ok((
            StatusCode::ACCEPTED,
            Json(json!({ "status": "already_running" })),
        )
            .into_response()),
    }
}

/// POST /api/health/tasks/{name}/run
///
/// 定期タスクを名前で即時起動する。完了は待たずに202を返す。
pub async fn run_task(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let status = match state.scheduler.trigger(&name) {
        TriggerOutcome::Started => "started",
        TriggerOutcome::AlreadyRunning => "already_running",
        TriggerOutcome::UnknownTask => {
            return Err(MonitorError::NotFound(format!("scheduled task {name}")).into())
        }
    };
    info!(task = %name, status, "Scheduled task triggered by operator");
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": status }))).into_response())
}

/// 直近サイクルの要約
#[derive(Debug, Serialize)]
pub struct LastCycleInfo {
    /// 完了時刻
    pub finished_at: DateTime<Utc>,
    /// 件数
    pub total: u64,
    /// 成功数
    pub pass: u64,
    /// 失敗数
    pub fail: u64,
    /// 平均応答時間
    pub avg_response_time_ms: f64,
}

/// スケジューラー状態
#[derive(Debug, Serialize)]
pub struct MonitorStatus {
    /// プローブサイクル実行中か
    pub probe_running: bool,
    /// 直近サイクル
    pub last_cycle: Option<LastCycleInfo>,
    /// レジストリのエントリ数
    pub registered_endpoints: usize,
    /// 自動プローブ対象数
    pub probed_endpoints: usize,
    /// 定期タスク
    pub tasks: Vec<TaskStatus>,
}

/// GET /api/health/status
pub async fn get_status(State(state): State<AppState>) -> Json<MonitorStatus> {
    let cycle = &state.monitor.probe_cycle;
    let last_cycle = cycle.last_cycle().await.map(|last| {
        let BatchSummary {
            total,
            pass,
            fail,
            avg_response_time_ms,
            ..
        } = last.summary;
        LastCycleInfo {
            finished_at: last.finished_at,
            total,
            pass,
            fail,
            avg_response_time_ms,
        }
    });
    let registry = cycle.executor().registry();

    Json(MonitorStatus {
        probe_running: cycle.is_running(),
        last_cycle,
        registered_endpoints: registry.len(),
        probed_endpoints: registry.list_get_endpoints().len(),
        tasks: state.scheduler.status(),
    })
}
