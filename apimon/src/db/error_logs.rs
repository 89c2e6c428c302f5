//! エラーログのストレージ層
//!
//! `error_logs` テーブルへの記録と、ウィンドウ集計。

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::error_log::{CodeErrorStats, EndpointErrorStats, ErrorRecord};
use crate::types::{parse_storage_timestamp, to_storage_timestamp};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, code, message, status, endpoint, request_id, \
     details, stack_trace, user_id, created_at FROM error_logs";

/// エラーログストレージ
#[derive(Clone)]
pub struct ErrorLogStorage {
    pool: SqlitePool,
}

impl ErrorLogStorage {
    /// 新しいストレージインスタンスを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// エラーを1行挿入
    pub async fn insert(&self, record: &ErrorRecord) -> MonitorResult<()> {
        let details = record
            .details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MonitorError::Internal(format!("Failed to encode details: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO error_logs (
                id, code, message, status, endpoint, request_id,
                details, stack_trace, user_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.code)
        .bind(&record.message)
        .bind(i64::from(record.status))
        .bind(&record.endpoint)
        .bind(&record.request_id)
        .bind(details)
        .bind(&record.stack_trace)
        .bind(&record.user_id)
        .bind(to_storage_timestamp(record.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to save error log: {}", e)))?;

        Ok(())
    }

    /// IDで取得
    pub async fn get(&self, id: Uuid) -> MonitorResult<Option<ErrorRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ? LIMIT 1");
        let row = sqlx::query_as::<_, ErrorLogRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to load error log: {}", e)))?;

        row.map(TryInto::try_into).transpose()
    }

    /// エンドポイント別件数（件数降順、同数はエンドポイント昇順）
    pub async fn endpoint_stats(
        &self,
        since: DateTime<Utc>,
    ) -> MonitorResult<Vec<EndpointErrorStats>> {
        let rows = sqlx::query_as::<_, EndpointStatsRow>(
            r#"
            SELECT
                endpoint,
                COUNT(*) AS count,
                MIN(created_at) AS first_occurrence,
                MAX(created_at) AS last_occurrence
            FROM error_logs
            WHERE created_at >= ?
            GROUP BY endpoint
            ORDER BY count DESC, endpoint ASC
            "#,
        )
        .bind(to_storage_timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to aggregate errors: {}", e)))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// コード別件数（件数降順、同数はコード昇順）
    pub async fn code_stats(&self, since: DateTime<Utc>) -> MonitorResult<Vec<CodeErrorStats>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT code, COUNT(*) AS count
            FROM error_logs
            WHERE created_at >= ?
            GROUP BY code
            ORDER BY count DESC, code ASC
            "#,
        )
        .bind(to_storage_timestamp(since))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to aggregate errors: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|(code, count)| CodeErrorStats {
                code,
                count: count.max(0) as u64,
            })
            .collect())
    }

    /// ウィンドウ内の直近エラー（新しい順）
    pub async fn recent(&self, since: DateTime<Utc>, limit: u32) -> MonitorResult<Vec<ErrorRecord>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE created_at >= ? ORDER BY created_at DESC, rowid DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, ErrorLogRow>(&sql)
            .bind(to_storage_timestamp(since))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to load errors: {}", e)))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// ウィンドウ内の総件数
    pub async fn count_since(&self, since: DateTime<Utc>) -> MonitorResult<u64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM error_logs WHERE created_at >= ?")
                .bind(to_storage_timestamp(since))
                .fetch_one(&self.pool)
                .await
                .map_err(|e| MonitorError::Database(format!("Failed to count errors: {}", e)))?;
        Ok(count.max(0) as u64)
    }

    /// 指定時刻より古い行を削除
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> MonitorResult<u64> {
        let result = sqlx::query("DELETE FROM error_logs WHERE created_at < ?")
            .bind(to_storage_timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to cleanup error logs: {}", e)))?;
        Ok(result.rows_affected())
    }
}

// --- Internal Row Types ---

#[derive(sqlx::FromRow)]
struct ErrorLogRow {
    id: String,
    code: String,
    message: String,
    status: i64,
    endpoint: String,
    request_id: String,
    details: Option<String>,
    stack_trace: Option<String>,
    user_id: Option<String>,
    created_at: String,
}

impl TryFrom<ErrorLogRow> for ErrorRecord {
    type Error = MonitorError;

    fn try_from(row: ErrorLogRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| MonitorError::Database(format!("Invalid error log id: {}", e)))?;
        let created_at = parse_timestamp(&row.created_at)?;
        // 壊れたdetailsは行ごと捨てずにNoneとして扱う
        let details = row
            .details
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok());

        Ok(ErrorRecord {
            id,
            code: row.code,
            message: row.message,
            status: u16::try_from(row.status).unwrap_or(500),
            endpoint: row.endpoint,
            request_id: row.request_id,
            details,
            stack_trace: row.stack_trace,
            user_id: row.user_id,
            created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EndpointStatsRow {
    endpoint: String,
    count: i64,
    first_occurrence: String,
    last_occurrence: String,
}

impl TryFrom<EndpointStatsRow> for EndpointErrorStats {
    type Error = MonitorError;

    fn try_from(row: EndpointStatsRow) -> Result<Self, Self::Error> {
        Ok(EndpointErrorStats {
            endpoint: row.endpoint,
            count: row.count.max(0) as u64,
            first_occurrence: parse_timestamp(&row.first_occurrence)?,
            last_occurrence: parse_timestamp(&row.last_occurrence)?,
        })
    }
}

fn parse_timestamp(value: &str) -> MonitorResult<DateTime<Utc>> {
    parse_storage_timestamp(value)
        .ok_or_else(|| MonitorError::Database(format!("Invalid created_at: {}", value)))
}
