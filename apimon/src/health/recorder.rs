//! 結果レコーダー
//!
//! ヘルスチェック結果とエラーログの唯一の書き込み経路。
//! 永続化に失敗しても呼び出し元の処理は止めず、ログに残して握りつぶす。

use crate::db::error_logs::ErrorLogStorage;
use crate::db::health_checks::HealthCheckStorage;
use crate::types::{CheckResult, ErrorRecord, NewErrorRecord};
use tracing::{debug, error};

/// 結果レコーダー
#[derive(Clone)]
pub struct ResultRecorder {
    health_checks: HealthCheckStorage,
    error_logs: ErrorLogStorage,
}

impl ResultRecorder {
    /// 新しいレコーダーを作成
    pub fn new(health_checks: HealthCheckStorage, error_logs: ErrorLogStorage) -> Self {
        Self {
            health_checks,
            error_logs,
        }
    }

    /// プローブ結果を1行記録する
    ///
    /// 成否を返すが、呼び出し側はこれで処理を分岐させる必要はない。
    pub async fn record_check(&self, result: &CheckResult) -> bool {
        match self.health_checks.insert(result).await {
            Ok(()) => {
                debug!(
                    id = %result.id,
                    endpoint = %result.endpoint,
                    status = %result.status,
                    "Health check recorded"
                );
                true
            }
            Err(e) => {
                error!(
                    component = "recorder",
                    id = %result.id,
                    endpoint = %result.endpoint,
                    error = %e,
                    "Failed to record health check"
                );
                false
            }
        }
    }

    /// エラーを記録する。IDと日時が欠けていれば補う
    pub async fn record_error(&self, new_record: NewErrorRecord) -> ErrorRecord {
        let record = new_record.into_record();
        if let Err(e) = self.error_logs.insert(&record).await {
            error!(
                component = "recorder",
                id = %record.id,
                code = %record.code,
                request_id = %record.request_id,
                error = %e,
                "Failed to record error log"
            );
        }
        record
    }
}
