// データベース接続プールの作成とマイグレーション実行

use crate::common::error::MonitorError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

/// SQLiteのロック待ち上限
const BUSY_TIMEOUT_SECS: u64 = 5;

/// SQLiteデータベース接続プールを作成してマイグレーションを実行
///
/// # Arguments
/// * `database_url` - データベースURL（例: "sqlite:data/apimon.db"）
///
/// # Returns
/// * `Ok(SqlitePool)` - 初期化済みデータベースプール
/// * `Err(MonitorError)` - 初期化失敗
pub async fn initialize_database(database_url: &str) -> Result<SqlitePool, MonitorError> {
    let in_memory = database_url.contains(":memory:");
    if !in_memory {
        ensure_parent_dir(database_url)?;
    }

    let mut options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| MonitorError::Database(format!("Invalid database URL: {}", e)))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let mut pool_options = SqlitePoolOptions::new();
    if in_memory {
        // インメモリDBは接続ごとに分かれないよう1本に固定
        pool_options = pool_options.max_connections(1);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to connect to database: {}", e)))?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// マイグレーションを実行（sqlx::migrate!マクロを使用）
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MonitorError> {
    tracing::info!("Running database migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| MonitorError::Database(format!("Failed to run migrations: {}", e)))?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// SQLiteファイルはディレクトリが存在しないと作成できないため、先に作成しておく
fn ensure_parent_dir(database_url: &str) -> Result<(), MonitorError> {
    let Some(path) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    // `sqlite://` 形式に備えてスラッシュを除去し、クエリ部分を除外
    let normalized = path.trim_start_matches("//");
    let path_without_params = normalized.split('?').next().unwrap_or(normalized);
    if let Some(parent) = std::path::Path::new(path_without_params).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MonitorError::Database(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}
