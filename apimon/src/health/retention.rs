//! 保持期間による一括削除
//!
//! 保持日数は設定値（環境変数）をデフォルトとし、`settings` テーブルの値で上書きできる。

use crate::common::error::{CommonError, MonitorResult};
use crate::db::error_logs::ErrorLogStorage;
use crate::db::health_checks::HealthCheckStorage;
use crate::db::settings::{
    SettingsStorage, ERROR_LOG_RETENTION_DAYS_KEY, HEALTH_CHECK_RETENTION_DAYS_KEY,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// 実効保持日数
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// ヘルスチェック結果
    pub health_check_retention_days: i64,
    /// エラーログ
    pub error_log_retention_days: i64,
}

/// 1回の削除結果
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct RetentionReport {
    /// 削除したヘルスチェック結果の件数
    pub health_checks_deleted: u64,
    /// 削除したエラーログの件数
    pub error_logs_deleted: u64,
}

/// 保持期間スイーパー
#[derive(Clone)]
pub struct RetentionSweeper {
    health_checks: HealthCheckStorage,
    error_logs: ErrorLogStorage,
    settings: SettingsStorage,
    defaults: RetentionPolicy,
}

fn cutoff(now: DateTime<Utc>, days: i64) -> MonitorResult<DateTime<Utc>> {
    if days < 1 {
        return Err(CommonError::Validation(format!(
            "retention days must be at least 1, got {days}"
        ))
        .into());
    }
    Duration::try_days(days)
        .and_then(|horizon| now.checked_sub_signed(horizon))
        .ok_or_else(|| {
            CommonError::Validation(format!("retention days {days} is out of range")).into()
        })
}

impl RetentionSweeper {
    /// 新しいスイーパーを作成
    pub fn new(
        health_checks: HealthCheckStorage,
        error_logs: ErrorLogStorage,
        settings: SettingsStorage,
        defaults: RetentionPolicy,
    ) -> Self {
        Self {
            health_checks,
            error_logs,
            settings,
            defaults,
        }
    }

    /// `now - days` より古いヘルスチェック結果とエラーログを削除し、合計件数を返す
    pub async fn cleanup_older_than(&self, days: i64) -> MonitorResult<u64> {
        let report = self
            .sweep(RetentionPolicy {
                health_check_retention_days: days,
                error_log_retention_days: days,
            })
            .await?;
        Ok(report.health_checks_deleted + report.error_logs_deleted)
    }

    /// 設定上書きを反映した保持日数
    pub async fn effective_policy(&self) -> MonitorResult<RetentionPolicy> {
        let health_check_retention_days = self
            .settings
            .get_retention_days(HEALTH_CHECK_RETENTION_DAYS_KEY)
            .await?
            .unwrap_or(self.defaults.health_check_retention_days);
        let error_log_retention_days = self
            .settings
            .get_retention_days(ERROR_LOG_RETENTION_DAYS_KEY)
            .await?
            .unwrap_or(self.defaults.error_log_retention_days);

        Ok(RetentionPolicy {
            health_check_retention_days,
            error_log_retention_days,
        })
    }

    /// 保持日数の上書きを保存する
    pub async fn update_policy(&self, policy: RetentionPolicy) -> MonitorResult<RetentionPolicy> {
        // 片方だけ保存されないよう先に両方検証する
        let now = Utc::now();
        cutoff(now, policy.health_check_retention_days)?;
        cutoff(now, policy.error_log_retention_days)?;

        self.settings
            .set_retention_days(
                HEALTH_CHECK_RETENTION_DAYS_KEY,
                policy.health_check_retention_days,
            )
            .await?;
        self.settings
            .set_retention_days(ERROR_LOG_RETENTION_DAYS_KEY, policy.error_log_retention_days)
            .await?;
        info!(
            health_check_retention_days = policy.health_check_retention_days,
            error_log_retention_days = policy.error_log_retention_days,
            "Retention policy updated"
        );
        Ok(policy)
    }

    /// 実効保持日数で削除する（日次タスク用）
    pub async fn run(&self) -> MonitorResult<RetentionReport> {
        let policy = self.effective_policy().await?;
        self.sweep(policy).await
    }

    async fn sweep(&self, policy: RetentionPolicy) -> MonitorResult<RetentionReport> {
        let now = Utc::now();
        let health_cutoff = cutoff(now, policy.health_check_retention_days)?;
        let error_cutoff = cutoff(now, policy.error_log_retention_days)?;

        let health_checks_deleted = self.health_checks.delete_older_than(health_cutoff).await?;
        let error_logs_deleted = self.error_logs.delete_older_than(error_cutoff).await?;

        info!(
            health_checks_deleted,
            error_logs_deleted,
            health_check_retention_days = policy.health_check_retention_days,
            error_log_retention_days = policy.error_log_retention_days,
            "Retention sweep completed"
        );

        Ok(RetentionReport {
            health_checks_deleted,
            error_logs_deleted,
        })
    }
}
