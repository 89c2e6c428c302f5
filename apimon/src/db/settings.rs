//! 設定テーブルのストレージ層
//!
//! キーバリュー設定。保持日数の上書き値もここに置く。

use crate::common::error::{CommonError, MonitorError, MonitorResult};
use sqlx::SqlitePool;

/// ヘルスチェック保持日数の設定キー
pub const HEALTH_CHECK_RETENTION_DAYS_KEY: &str = "health_check_retention_days";
/// エラーログ保持日数の設定キー
pub const ERROR_LOG_RETENTION_DAYS_KEY: &str = "error_log_retention_days";

/// 設定ストレージ
#[derive(Clone)]
pub struct SettingsStorage {
    pool: SqlitePool,
}

impl SettingsStorage {
    /// 新しいストレージインスタンスを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 設定値を取得
    pub async fn get_setting(&self, key: &str) -> MonitorResult<Option<String>> {
        let result = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to get setting: {}", e)))?;

        Ok(result)
    }

    /// 設定値を保存（UPSERT）
    pub async fn set_setting(&self, key: &str, value: &str) -> MonitorResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to set setting: {}", e)))?;

        Ok(())
    }

    /// 保持日数の上書き値を取得
    ///
    /// 値が数値として読めない場合は警告を出して未設定扱いにする。
    pub async fn get_retention_days(&self, key: &str) -> MonitorResult<Option<i64>> {
        let Some(raw) = self.get_setting(key).await? else {
            return Ok(None);
        };
        match raw.trim().parse::<i64>() {
            Ok(days) if days > 0 => Ok(Some(days)),
            _ => {
                tracing::warn!(key = key, value = %raw, "Ignoring invalid retention setting");
                Ok(None)
            }
        }
    }

    /// 保持日数の上書き値を保存（1以上）
    pub async fn set_retention_days(&self, key: &str, days: i64) -> MonitorResult<()> {
        if days < 1 {
            return Err(CommonError::Validation(format!(
                "{key} must be at least 1 day, got {days}"
            ))
            .into());
        }
        self.set_setting(key, &days.to_string()).await
    }
}
