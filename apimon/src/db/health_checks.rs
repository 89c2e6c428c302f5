//! ヘルスチェック結果のストレージ層
//!
//! `health_checks` テーブルへの挿入・参照・集計・一括削除。
//! フィルタはすべてバインドパラメータで、動的に組み立てるのは許可済みの述語の有無だけ。

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::health::{CategoryHealth, CheckResult, CheckStatus, EndpointHealth, HealthStats};
use crate::types::{parse_storage_timestamp, to_storage_timestamp};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, endpoint, category, status, response_time_ms, \
     status_code, error_message, created_at FROM health_checks";

/// 履歴取得フィルタ
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFilter {
    /// この時刻以降の行のみ
    pub since: DateTime<Utc>,
    /// カテゴリ一致
    pub category: Option<String>,
    /// エンドポイント一致
    pub endpoint: Option<String>,
    /// 最大件数
    pub limit: u32,
}

/// 集計のグループキー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKey {
    Category,
    Endpoint,
}

impl GroupKey {
    fn column(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Endpoint => "endpoint",
        }
    }
}

/// ヘルスチェック結果ストレージ
#[derive(Clone)]
pub struct HealthCheckStorage {
    pool: SqlitePool,
}

impl HealthCheckStorage {
    /// 新しいストレージインスタンスを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 結果を1行挿入
    pub async fn insert(&self, result: &CheckResult) -> MonitorResult<()> {
        sqlx::query(
            r#"
            INSERT INTO health_checks (
                id, endpoint, category, status, response_time_ms,
                status_code, error_message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(result.id.to_string())
        .bind(&result.endpoint)
        .bind(&result.category)
        .bind(result.status.as_str())
        .bind(result.response_time_ms.map(|v| v as i64))
        .bind(result.status_code.map(i64::from))
        .bind(&result.error_message)
        .bind(to_storage_timestamp(result.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to save health check: {}", e)))?;

        Ok(())
    }

    /// IDで取得
    pub async fn get(&self, id: Uuid) -> MonitorResult<Option<CheckResult>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ? LIMIT 1");
        let row = sqlx::query_as::<_, HealthCheckRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to load health check: {}", e)))?;

        row.map(TryInto::try_into).transpose()
    }

    /// 生データをページング取得（新しい順）
    pub async fn list(&self, limit: u32, offset: u32) -> MonitorResult<Vec<CheckResult>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?");
        let rows = sqlx::query_as::<_, HealthCheckRow>(&sql)
            .bind(i64::from(limit))
            .bind(i64::from(offset))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to list health checks: {}", e)))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// 総件数
    pub async fn count(&self) -> MonitorResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM health_checks")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to count health checks: {}", e)))?;
        Ok(count as u64)
    }

    /// フィルタ付き履歴（新しい順）
    pub async fn history(&self, filter: &HistoryFilter) -> MonitorResult<Vec<CheckResult>> {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_COLUMNS);
        builder.push(" WHERE created_at >= ");
        builder.push_bind(to_storage_timestamp(filter.since));
        if let Some(category) = &filter.category {
            builder.push(" AND category = ");
            builder.push_bind(category.clone());
        }
        if let Some(endpoint) = &filter.endpoint {
            builder.push(" AND endpoint = ");
            builder.push_bind(endpoint.clone());
        }
        builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        builder.push_bind(i64::from(filter.limit));

        let rows = builder
            .build_query_as::<HealthCheckRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to query history: {}", e)))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// ウィンドウ内の全体集計
    pub async fn overall_stats(&self, since: DateTime<Utc>) -> MonitorResult<HealthStats> {
        let row = sqlx::query_as::<_, StatsRow>(
            r#"
            SELECT
                '' AS group_key,
                COUNT(*) AS total_checks,
                COALESCE(SUM(CASE WHEN status = 'pass' THEN 1 ELSE 0 END), 0) AS passed_checks,
                COALESCE(AVG(response_time_ms), 0.0) AS avg_response_time_ms
            FROM health_checks
            WHERE created_at >= ?
            "#,
        )
        .bind(to_storage_timestamp(since))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to aggregate health checks: {}", e)))?;

        Ok(row.into_stats().1)
    }

    /// カテゴリ別集計（カテゴリ昇順）
    pub async fn category_stats(&self, since: DateTime<Utc>) -> MonitorResult<Vec<CategoryHealth>> {
        let rows = self.grouped_stats(GroupKey::Category, since).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let (category, stats) = row.into_stats();
                CategoryHealth { category, stats }
            })
            .collect())
    }

    /// エンドポイント別集計（エンドポイント昇順）
    pub async fn endpoint_stats(&self, since: DateTime<Utc>) -> MonitorResult<Vec<EndpointHealth>> {
        let rows = self.grouped_stats(GroupKey::Endpoint, since).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let (endpoint, stats) = row.into_stats();
                EndpointHealth { endpoint, stats }
            })
            .collect())
    }

    async fn grouped_stats(
        &self,
        key: GroupKey,
        since: DateTime<Utc>,
    ) -> MonitorResult<Vec<StatsRow>> {
        let column = key.column();
        let sql = format!(
            r#"
            SELECT
                {column} AS group_key,
                COUNT(*) AS total_checks,
                COALESCE(SUM(CASE WHEN status = 'pass' THEN 1 ELSE 0 END), 0) AS passed_checks,
                COALESCE(AVG(response_time_ms), 0.0) AS avg_response_time_ms
            FROM health_checks
            WHERE created_at >= ?
            GROUP BY {column}
            ORDER BY {column} ASC
            "#
        );

        sqlx::query_as::<_, StatsRow>(&sql)
            .bind(to_storage_timestamp(since))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                MonitorError::Database(format!("Failed to aggregate by {}: {}", column, e))
            })
    }

    /// ウィンドウ内の直近の失敗（新しい順）
    pub async fn recent_failures(
        &self,
        since: DateTime<Utc>,
        limit: u32,
    ) -> MonitorResult<Vec<CheckResult>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE status = ? AND created_at >= ? \
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        );
        let rows = sqlx::query_as::<_, HealthCheckRow>(&sql)
            .bind(CheckStatus::Fail.as_str())
            .bind(to_storage_timestamp(since))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to load failures: {}", e)))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// 1件削除
    pub async fn delete(&self, id: Uuid) -> MonitorResult<bool> {
        let result = sqlx::query("DELETE FROM health_checks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| MonitorError::Database(format!("Failed to delete health check: {}", e)))?;
        Ok(result.rows_affected() > 0)
    }

    /// 全件削除
    pub async fn delete_all(&self) -> MonitorResult<u64> {
        let result = sqlx::query("DELETE FROM health_checks")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MonitorError::Database(format!("Failed to delete health checks: {}", e))
            })?;
        Ok(result.rows_affected())
    }

    /// 指定時刻より古い行を削除
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> MonitorResult<u64> {
        let result = sqlx::query("DELETE FROM health_checks WHERE created_at < ?")
            .bind(to_storage_timestamp(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                MonitorError::Database(format!("Failed to cleanup health checks: {}", e))
            })?;
        Ok(result.rows_affected())
    }
}

// --- Internal Row Types ---

#[derive(sqlx::FromRow)]
struct HealthCheckRow {
    id: String,
    endpoint: String,
    category: String,
    status: String,
    response_time_ms: Option<i64>,
    status_code: Option<i64>,
    error_message: Option<String>,
    created_at: String,
}

impl TryFrom<HealthCheckRow> for CheckResult {
    type Error = MonitorError;

    fn try_from(row: HealthCheckRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| MonitorError::Database(format!("Invalid health check id: {}", e)))?;
        let status = row.status.parse().map_err(MonitorError::Database)?;
        let created_at = parse_storage_timestamp(&row.created_at).ok_or_else(|| {
            MonitorError::Database(format!("Invalid created_at: {}", row.created_at))
        })?;

        Ok(CheckResult {
            id,
            endpoint: row.endpoint,
            category: row.category,
            status,
            response_time_ms: row.response_time_ms.map(|v| v.max(0) as u64),
            status_code: row.status_code.and_then(|v| u16::try_from(v).ok()),
            error_message: row.error_message,
            created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    group_key: String,
    total_checks: i64,
    passed_checks: i64,
    avg_response_time_ms: f64,
}

impl StatsRow {
    fn into_stats(self) -> (String, HealthStats) {
        let total = self.total_checks.max(0) as u64;
        let passed = self.passed_checks.max(0) as u64;
        (
            self.group_key,
            HealthStats {
                total_checks: total,
                passed_checks: passed,
                failed_checks: total.saturating_sub(passed),
                avg_response_time_ms: self.avg_response_time_ms,
            },
        )
    }
}
