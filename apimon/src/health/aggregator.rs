//! 集計
//!
//! 保存済みの行からウィンドウ集計を毎回計算する。キャッシュは持たない。
//! 読み取り系なので、ストレージのエラーはそのまま呼び出し元へ返す。

use crate::common::error::{MonitorError, MonitorResult};
use crate::db::error_logs::ErrorLogStorage;
use crate::db::health_checks::{HealthCheckStorage, HistoryFilter};
use crate::types::{CheckResult, ErrorRecord, ErrorStats, HealthSummary, Timeframe};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// 履歴のデフォルト件数
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;
/// 履歴の最大件数
pub const MAX_HISTORY_LIMIT: u32 = 1000;
/// 生データ一覧のデフォルト件数
pub const DEFAULT_PAGE_LIMIT: u32 = 50;
/// 生データ一覧の最大件数
pub const MAX_PAGE_LIMIT: u32 = 500;

/// 履歴クエリ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryQuery {
    /// 集計ウィンドウ（未指定は24h）
    pub timeframe: Timeframe,
    /// カテゴリ
    pub category: Option<String>,
    /// エンドポイント
    pub endpoint: Option<String>,
    /// 件数上限
    pub limit: Option<u32>,
}

/// 生データのページ
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckPage {
    /// 結果（新しい順）
    pub items: Vec<CheckResult>,
    /// 総件数
    pub total: u64,
    /// 件数上限
    pub limit: u32,
    /// オフセット
    pub offset: u32,
}

/// 集計器
#[derive(Clone)]
pub struct Aggregator {
    health_checks: HealthCheckStorage,
    error_logs: ErrorLogStorage,
    recent_limit: u32,
}

impl Aggregator {
    /// 新しい集計器を作成
    pub fn new(
        health_checks: HealthCheckStorage,
        error_logs: ErrorLogStorage,
        recent_limit: usize,
    ) -> Self {
        Self {
            health_checks,
            error_logs,
            recent_limit: u32::try_from(recent_limit).unwrap_or(u32::MAX).max(1),
        }
    }

    /// ヘルスサマリー
    pub async fn get_health_summary(&self, timeframe: Timeframe) -> MonitorResult<HealthSummary> {
        self.get_health_summary_at(timeframe, Utc::now()).await
    }

    async fn get_health_summary_at(
        &self,
        timeframe: Timeframe,
        now: DateTime<Utc>,
    ) -> MonitorResult<HealthSummary> {
        let since = timeframe.cutoff_from(now);

        let overall = self.health_checks.overall_stats(since).await?;
        let per_category = self.health_checks.category_stats(since).await?;
        let per_endpoint = self.health_checks.endpoint_stats(since).await?;
        let recent_failures = self
            .health_checks
            .recent_failures(since, self.recent_limit)
            .await?;

        Ok(HealthSummary {
            timeframe: timeframe.to_string(),
            overall,
            per_category,
            per_endpoint,
            recent_failures,
        })
    }

    /// ヘルス履歴（新しい順）
    pub async fn get_health_history(&self, query: &HistoryQuery) -> MonitorResult<Vec<CheckResult>> {
        let filter = HistoryFilter {
            since: query.timeframe.cutoff(),
            category: non_empty(query.category.as_deref()),
            endpoint: non_empty(query.endpoint.as_deref()),
            limit: query
                .limit
                .unwrap_or(DEFAULT_HISTORY_LIMIT)
                .clamp(1, MAX_HISTORY_LIMIT),
        };
        self.health_checks.history(&filter).await
    }

    /// 生データをページング取得
    pub async fn list_checks(&self, limit: Option<u32>, offset: Option<u32>) -> MonitorResult<CheckPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        let offset = offset.unwrap_or(0);
        let items = self.health_checks.list(limit, offset).await?;
        let total = self.health_checks.count().await?;
        Ok(CheckPage {
            items,
            total,
            limit,
            offset,
        })
    }

    /// エラー統計
    ///
    /// `limit` は `recent_errors` の件数に効く（未指定は設定値）。
    pub async fn get_error_stats(
        &self,
        timeframe: Timeframe,
        limit: Option<u32>,
    ) -> MonitorResult<ErrorStats> {
        let since = timeframe.cutoff();
        let limit = limit.unwrap_or(self.recent_limit).clamp(1, MAX_HISTORY_LIMIT);

        let endpoint_stats = self.error_logs.endpoint_stats(since).await?;
        let code_stats = self.error_logs.code_stats(since).await?;
        let recent_errors = self.error_logs.recent(since, limit).await?;
        let total_count = self.error_logs.count_since(since).await?;

        Ok(ErrorStats {
            timeframe: timeframe.to_string(),
            endpoint_stats,
            code_stats,
            recent_errors,
            total_count,
        })
    }

    /// エラー1件
    pub async fn get_error(&self, id: Uuid) -> MonitorResult<ErrorRecord> {
        self.error_logs
            .get(id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(format!("error log {id}")))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
