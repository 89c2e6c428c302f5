//! API health monitor
//!
//! 登録済みエンドポイントを定期的にプローブし、結果を時系列で保存して集計するサービス

#![warn(missing_docs)]

/// 共通型定義（エラー）
pub mod common;

/// REST APIハンドラー
pub mod api;

/// プローブ用認証情報
pub mod auth;

/// CLIインターフェース
pub mod cli;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// データベースアクセス
pub mod db;

/// ヘルスモニター（プローブ・集計・保持期間・スケジューラー）
pub mod health;

/// ロギング初期化ユーティリティ
pub mod logging;

/// エンドポイントレジストリ
pub mod registry;

/// Shutdown controller
pub mod shutdown;

/// 型定義
pub mod types;

use std::sync::Arc;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// 配線済みのモニター部品
    pub monitor: health::HealthMonitor,
    /// ヘルスチェック結果ストレージ（運用者による削除用）
    pub health_checks: db::health_checks::HealthCheckStorage,
    /// 定期タスクのスケジューラー
    pub scheduler: Arc<health::scheduler::Scheduler>,
    /// Cooperative shutdown controller
    pub shutdown: shutdown::ShutdownController,
}

impl AppState {
    /// プールと設定から状態を組み立てる（スケジューラーは未起動）
    pub fn new(
        pool: sqlx::SqlitePool,
        config: config::MonitorConfig,
        registry: Arc<registry::EndpointRegistry>,
        credentials: Arc<dyn auth::CredentialProvider>,
        shutdown: shutdown::ShutdownController,
    ) -> common::error::MonitorResult<Self> {
        let health_checks = db::health_checks::HealthCheckStorage::new(pool.clone());
        let monitor = health::HealthMonitor::new(pool, config, registry, credentials)?;
        let scheduler = Arc::new(monitor.scheduler(shutdown.clone()));
        Ok(Self {
            monitor,
            health_checks,
            scheduler,
            shutdown,
        })
    }
}
